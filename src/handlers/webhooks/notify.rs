use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::db::AppState;
use crate::error::AppError;
use crate::extractors::{Form, Query};
use crate::service::NotifyOutcome;

/// Acknowledgement body the gateway expects; anything else triggers its retry.
const ACK: &str = "success";
const NACK: &str = "fail";

/// Gateway callback delivered as query parameters.
pub async fn handle_notify_query(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    process_notification(&state, &params)
}

/// Gateway callback delivered as a form body.
pub async fn handle_notify_form(
    State(state): State<AppState>,
    Form(params): Form<Vec<(String, String)>>,
) -> impl IntoResponse {
    process_notification(&state, &params)
}

fn process_notification(state: &AppState, params: &[(String, String)]) -> (StatusCode, &'static str) {
    match state.licensor.handle_notification(params) {
        Ok(NotifyOutcome::Confirmed(current)) => {
            if current.newly_paid {
                tracing::info!("Payment callback confirmed order {}", current.order.out_trade_no);
            }
            (StatusCode::OK, ACK)
        }
        Ok(NotifyOutcome::Ignored { .. }) => (StatusCode::OK, ACK),
        Err(AppError::SignatureMismatch) => (StatusCode::UNAUTHORIZED, NACK),
        Err(AppError::OrderNotFound(out_trade_no)) => {
            tracing::warn!("Payment callback for unknown order {}", out_trade_no);
            (StatusCode::NOT_FOUND, NACK)
        }
        Err(AppError::BadRequest(msg)) => {
            tracing::warn!("Malformed payment callback: {}", msg);
            (StatusCode::BAD_REQUEST, NACK)
        }
        Err(e) => {
            tracing::error!("Failed to process payment callback: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, NACK)
        }
    }
}
