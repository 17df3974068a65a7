use axum::{body::Body, http::{Request, StatusCode}};
use tower::ServiceExt;

use licensor::config::RateLimitBackend;
use licensor::rate_limit::FixedWindow;

use crate::common::*;

fn health_from(ip: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri("/health")
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_sixty_first_request_is_rejected() {
    let app = create_test_app_with_limit(FixedWindow::default());
    let router = app.router();

    for i in 1..=60 {
        let response = router.clone().oneshot(health_from("10.0.0.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {i}");
    }

    let response = router.clone().oneshot(health_from("10.0.0.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["code"], "RATE_LIMITED");

    // other clients are unaffected
    let response = router.oneshot(health_from("10.0.0.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_runs_before_handlers() {
    let app = create_test_app_with_limit(FixedWindow::new(1, 60));
    let router = app.router();

    let order = create_pending_order(&app, "alice", licensor::license::Term::Month).await;
    let params = signed_callback(&order.out_trade_no, "TRADE_SUCCESS", GATEWAY_KEY);
    let uri = format!("/notify?{}", to_query_string(&params));

    let first = router.clone().oneshot(health_from("10.0.0.1")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let mut request = get_request(&uri);
    request
        .headers_mut()
        .insert("x-forwarded-for", "10.0.0.1".parse().unwrap());
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(token_count(&app, "alice"), 0);
}

#[tokio::test]
async fn test_sqlite_backend_enforces_the_same_limit() {
    let app = build_test_app(FixedWindow::new(3, 60), RateLimitBackend::Sqlite, None);
    let router = app.router();

    for _ in 0..3 {
        let response = router.clone().oneshot(health_from("10.0.0.9")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = router.oneshot(health_from("10.0.0.9")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
