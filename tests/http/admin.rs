use axum::{body::Body, http::{Request, StatusCode}};
use serde_json::json;
use tower::ServiceExt;

use crate::common::*;

fn issue_request(token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/admin/tokens")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_admin_grant_requires_bearer_token() {
    let app = create_test_app();
    let body = json!({ "identity": "alice", "term": "1y" });

    let response = app
        .router()
        .oneshot(issue_request(None, body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router()
        .oneshot(issue_request(Some("not-the-token"), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(token_count(&app, "alice"), 0);
}

#[tokio::test]
async fn test_admin_grant_issues_verifiable_token() {
    let app = create_test_app();
    let response = app
        .router()
        .oneshot(issue_request(
            Some(ADMIN_TOKEN),
            json!({ "identity": "alice", "term": "Lifetime", "purchase_time_ms": T0 * 1000 + 999 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["identity"], "alice");
    assert_eq!(body["term"], "Lifetime");
    // milliseconds are truncated to whole seconds
    assert_eq!(body["purchase_time"], T0);
    let token = body["token"].as_str().unwrap();
    assert!(app.licensor().verify_token("alice", token));

    let view = app.licensor().query_subscription("alice", T0 + 1).unwrap();
    assert!(view.status.is_lifetime);
}

#[tokio::test]
async fn test_admin_grant_rejects_unknown_term() {
    let app = create_test_app();
    let response = app
        .router()
        .oneshot(issue_request(
            Some(ADMIN_TOKEN),
            json!({ "identity": "alice", "term": "forever" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_TERM");
}

#[tokio::test]
async fn test_admin_routes_closed_without_configured_token() {
    let app = create_test_app_without_admin();
    let response = app
        .router()
        .oneshot(issue_request(
            Some(ADMIN_TOKEN),
            json!({ "identity": "alice", "term": "1m" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
