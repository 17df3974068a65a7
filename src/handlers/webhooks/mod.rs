mod notify;

pub use notify::*;

use axum::{Router, routing::get};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/notify", get(handle_notify_query).post(handle_notify_form))
}
