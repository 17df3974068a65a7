use chrono::Utc;

use licensor::db::queries;
use licensor::error::AppError;
use licensor::license::{Term, check_tokens, public_key_from_hex};

use crate::common::*;

fn issue(app: &TestApp, identity: &str, term: Term, purchase_at: i64) -> String {
    app.licensor()
        .issue_token(identity, term, Some(purchase_at * 1000))
        .unwrap()
        .token
}

#[tokio::test]
async fn test_overlapping_purchases_stack() {
    let app = create_test_app();
    issue(&app, "alice", Term::Month, T0);
    issue(&app, "alice", Term::Month, T0 + 10 * DAY);

    let view = app
        .licensor()
        .query_subscription("alice", T0 + 11 * DAY)
        .unwrap();

    assert!(view.status.is_vip);
    assert!(!view.status.is_lifetime);
    assert_eq!(view.status.expire_at, T0 + 60 * DAY);
    assert_eq!(view.tokens.len(), 2);
}

#[tokio::test]
async fn test_purchase_after_lapse_starts_fresh() {
    let app = create_test_app();
    issue(&app, "alice", Term::Month, T0);
    issue(&app, "alice", Term::Month, T0 + 40 * DAY);

    let view = app
        .licensor()
        .query_subscription("alice", T0 + 41 * DAY)
        .unwrap();

    assert!(view.status.is_vip);
    assert_eq!(view.status.expire_at, T0 + 70 * DAY);
}

#[tokio::test]
async fn test_issue_order_does_not_matter() {
    let app = create_test_app();
    issue(&app, "alice", Term::Month, T0 + 10 * DAY);
    issue(&app, "alice", Term::Month, T0);

    let view = app.licensor().query_subscription("alice", T0 + DAY).unwrap();
    assert_eq!(view.status.expire_at, T0 + 60 * DAY);
}

#[tokio::test]
async fn test_expired_subscription_is_not_vip() {
    let app = create_test_app();
    issue(&app, "alice", Term::Month, T0);

    let view = app
        .licensor()
        .query_subscription("alice", T0 + 31 * DAY)
        .unwrap();
    assert!(!view.status.is_vip);
    assert_eq!(view.status.expire_at, T0 + 30 * DAY);
}

#[tokio::test]
async fn test_lifetime_never_lapses() {
    let app = create_test_app();
    issue(&app, "alice", Term::Month, T0);
    issue(&app, "alice", Term::Lifetime, T0 + DAY);

    let view = app
        .licensor()
        .query_subscription("alice", T0 + 50 * 365 * DAY)
        .unwrap();
    assert!(view.status.is_vip);
    assert!(view.status.is_lifetime);
}

#[tokio::test]
async fn test_future_purchase_time_reports_clock_tampering() {
    let app = create_test_app();
    let now = Utc::now().timestamp();
    issue(&app, "alice", Term::Year, now + DAY);

    let view = app.licensor().query_subscription("alice", now).unwrap();
    assert!(view.status.clock_tampered);
    assert!(!view.status.is_vip);
}

#[tokio::test]
async fn test_lifetime_does_not_hide_a_future_dated_token() {
    let app = create_test_app();
    issue(&app, "alice", Term::Lifetime, T0);
    issue(&app, "alice", Term::Month, T0 + 10 * DAY);

    let view = app
        .licensor()
        .query_subscription("alice", T0 + 5 * DAY)
        .unwrap();
    assert!(view.status.is_lifetime);
    assert!(view.status.clock_tampered);
    assert!(!view.status.is_vip);

    let view = app
        .licensor()
        .query_subscription("alice", T0 + 11 * DAY)
        .unwrap();
    assert!(view.status.is_vip);
}

#[tokio::test]
async fn test_no_tokens_is_not_vip() {
    let app = create_test_app();
    let view = app.licensor().query_subscription("nobody", T0).unwrap();
    assert!(!view.status.is_vip);
    assert_eq!(view.status.expire_at, 0);
    assert!(view.tokens.is_empty());
}

#[tokio::test]
async fn test_tokens_do_not_leak_across_identities() {
    let app = create_test_app();
    issue(&app, "alice", Term::Year, T0);

    let bob = app.licensor().query_subscription("bob", T0 + DAY).unwrap();
    assert!(!bob.status.is_vip);
    assert!(bob.tokens.is_empty());
}

#[tokio::test]
async fn test_stored_record_matches_recomputation() {
    let app = create_test_app();
    issue(&app, "alice", Term::Month, T0);
    issue(&app, "alice", Term::Month, T0 + 5 * DAY);

    let conn = app.db().get().unwrap();
    let record = queries::get_subscription(&conn, "alice").unwrap().unwrap();
    assert_eq!(record.expire_at, T0 + 60 * DAY);
    assert!(!record.is_lifetime);
}

#[tokio::test]
async fn test_holder_can_check_tokens_offline() {
    let app = create_test_app();
    issue(&app, "alice", Term::Month, T0);
    issue(&app, "alice", Term::Year, T0 + DAY);

    let view = app.licensor().query_subscription("alice", T0 + 2 * DAY).unwrap();
    let key = public_key_from_hex(&app.licensor().public_key_hex()).unwrap();

    let offline = check_tokens("alice", &view.tokens, &key, T0 + 2 * DAY);
    assert_eq!(offline, view.status);

    // the same tokens are worthless for another identity
    let stolen = check_tokens("mallory", &view.tokens, &key, T0 + 2 * DAY);
    assert!(!stolen.is_vip);
}

#[tokio::test]
async fn test_negative_purchase_time_is_rejected() {
    let app = create_test_app();
    let result = app.licensor().issue_token("alice", Term::Month, Some(-1));
    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert_eq!(token_count(&app, "alice"), 0);
}
