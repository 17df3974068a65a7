use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use licensor::license::Term;

use crate::common::*;

#[tokio::test]
async fn test_health() {
    let app = create_test_app();
    let response = app.router().oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_public_key_matches_issuer() {
    let app = create_test_app();
    let response = app
        .router()
        .oneshot(get_request("/public-key"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["public_key"], app.licensor().public_key_hex());
    // compressed SEC1 point
    assert_eq!(body["public_key"].as_str().unwrap().len(), 66);
}

#[tokio::test]
async fn test_create_paid_order_returns_payment_details() {
    let app = create_test_app();
    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({ "identity": "alice", "term": "1m" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "pending");
    assert_eq!(body["order"]["status"], "pending");
    assert_eq!(body["order"]["amount"], "9.90");
    assert!(body["payment"]["pay_url"].as_str().is_some());
}

#[tokio::test]
async fn test_create_trial_order_returns_token() {
    let app = create_test_app();
    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({ "identity": "alice", "term": "7d" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "trial");
    assert_eq!(body["newly_granted"], true);
    assert!(body["token"].as_str().unwrap().contains("_7d_"));
}

#[tokio::test]
async fn test_unknown_term_is_bad_request() {
    let app = create_test_app();
    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({ "identity": "alice", "term": "2w" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "INVALID_TERM");
    assert_eq!(app.gateway.create_calls(), 0);
}

#[tokio::test]
async fn test_gateway_rejection_maps_to_bad_gateway() {
    let app = create_test_app();
    app.gateway.reject_orders();
    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({ "identity": "alice", "term": "1y" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["code"], "GATEWAY_REJECTED");
}

#[tokio::test]
async fn test_order_status_polls_until_paid() {
    let app = create_test_app();
    let order = create_pending_order(&app, "alice", Term::Year).await;
    let uri = format!("/orders/{}", order.out_trade_no);

    let response = app.router().oneshot(get_request(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "pending");
    assert!(body.get("token").is_none());

    app.gateway.mark_paid();
    let response = app.router().oneshot(get_request(&uri)).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["status"], "paid");
    assert_eq!(body["term"], "1y");
    let token = body["token"].as_str().unwrap();
    assert!(app.licensor().verify_token("alice", token));
}

#[tokio::test]
async fn test_order_status_unknown_order() {
    let app = create_test_app();
    let response = app
        .router()
        .oneshot(get_request("/orders/DOESNOTEXIST"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], "ORDER_NOT_FOUND");
}

#[tokio::test]
async fn test_subscription_and_trial_status() {
    let app = create_test_app();

    let response = app
        .router()
        .oneshot(get_request("/trial?identity=alice"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["used"], false);

    let trial = app.licensor().grant_trial("alice").unwrap();

    let response = app
        .router()
        .oneshot(get_request("/trial?identity=alice"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["used"], true);

    let response = app
        .router()
        .oneshot(get_request("/subscription?identity=alice"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["identity"], "alice");
    assert_eq!(body["is_vip"], true);
    assert_eq!(body["is_lifetime"], false);
    assert_eq!(body["clock_tampered"], false);
    assert_eq!(body["tokens"], json!([trial.token]));
}

#[tokio::test]
async fn test_subscription_requires_identity() {
    let app = create_test_app();
    let response = app
        .router()
        .oneshot(get_request("/subscription"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_gives_no_reason_for_invalid_tokens() {
    let app = create_test_app();
    let token = app
        .licensor()
        .issue_token("alice", Term::Month, None)
        .unwrap()
        .token;

    let cases = [
        ("alice", token.as_str(), true),
        ("bob", token.as_str(), false),
        ("alice", "garbage", false),
        ("alice", "S6K2O0_1m_", false),
    ];
    for (identity, candidate, expected) in cases {
        let response = app
            .router()
            .oneshot(json_request(
                "POST",
                "/verify",
                json!({ "identity": identity, "token": candidate }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "valid": expected }), "{identity} / {candidate}");
    }
}
