//! License issuance and verification service.
//!
//! Mints secp256k1-signed activation tokens bound to a user identity and a
//! purchased term, reconciles orders with an epay-style payment gateway
//! through signed callbacks and polling, and folds each identity's tokens
//! into a single subscription expiration.
//!
//! The core operations live on [`service::Licensor`]; [`app`] wraps them in
//! an axum router.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod license;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod rate_limit;
pub mod service;
pub mod util;

use std::sync::Arc;

use axum::{Router, middleware as axum_middleware};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{Config, RateLimitBackend};
use crate::db::{AppState, DbPool};
use crate::error::Result;
use crate::payments::EpayClient;
use crate::rate_limit::{FixedWindow, InMemoryRateLimiter, RateLimiter, SqliteRateLimiter};
use crate::service::{Licensor, LicensorSettings};

/// Full router with rate limiting, tracing and CORS applied.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::public::router())
        .merge(handlers::webhooks::router())
        .merge(handlers::admin::router(state.clone()))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn build_licensor(config: &Config, db: DbPool) -> Result<Licensor> {
    let keys = config.license_keys()?;
    let gateway = EpayClient::new(&config.gateway)?;
    Ok(Licensor::new(
        db,
        keys,
        Arc::new(gateway),
        LicensorSettings {
            gateway_key: config.gateway.key.clone(),
            notify_url: config.notify_url(),
            prices: config.prices.clone(),
        },
    ))
}

pub fn build_state(config: &Config, licensor: Licensor) -> AppState {
    let policy = FixedWindow::new(
        config.rate_limit.max_requests,
        config.rate_limit.window_secs,
    );
    let rate_limiter: Arc<dyn RateLimiter> = match config.rate_limit.backend {
        RateLimitBackend::Memory => Arc::new(InMemoryRateLimiter::new(policy)),
        RateLimitBackend::Sqlite => {
            Arc::new(SqliteRateLimiter::new(policy, licensor.db().clone()))
        }
    };

    AppState {
        licensor: Arc::new(licensor),
        rate_limiter,
        rate_limit_key: config.rate_limit.key,
        admin_token: config.admin_token.as_deref().map(Arc::from),
    }
}
