use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::db::AppState;
use crate::error::AppError;
use crate::rate_limit::{GLOBAL_KEY, RateLimitKey};
use crate::util::client_ip;

/// Gate every request through the configured rate limiter.
///
/// Over-limit requests get 429 before any handler runs. A limiter failure is
/// logged and the request let through.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = match state.rate_limit_key {
        RateLimitKey::Global => GLOBAL_KEY.to_string(),
        RateLimitKey::ClientIp => {
            client_ip(request.headers()).unwrap_or_else(|| "unknown".to_string())
        }
    };

    match state.rate_limiter.hit(&key, Utc::now().timestamp_millis()) {
        Ok(admission) if !admission.allowed => {
            tracing::warn!(
                "Rate limited {} ({} requests in window) on {}",
                key,
                admission.count,
                request.uri().path()
            );
            AppError::RateLimited.into_response()
        }
        Ok(_) => next.run(request).await,
        Err(e) => {
            tracing::error!("Rate limiter error, admitting request: {}", e);
            next.run(request).await
        }
    }
}
