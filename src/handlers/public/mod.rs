mod orders;
mod subscription;

pub use orders::*;
pub use subscription::*;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/public-key", get(public_key))
        .route("/orders", post(create_order))
        .route("/orders/{out_trade_no}", get(order_status))
        .route("/subscription", get(get_subscription))
        .route("/trial", get(trial_status))
        .route("/verify", post(verify_token))
}
