mod tokens;

pub use tokens::*;

use axum::{Router, middleware, routing::post};

use crate::db::AppState;
use crate::middleware::admin_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/tokens", post(issue_token))
        .layer(middleware::from_fn_with_state(state, admin_auth))
}
