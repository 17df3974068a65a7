use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid term: {0}")]
    InvalidTerm(String),

    #[error("Malformed token: {0}")]
    DecodeError(String),

    /// Gateway or license signature did not verify. Carries no detail on purpose.
    #[error("Signature mismatch")]
    SignatureMismatch,

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Payment gateway rejected the request: {0}")]
    GatewayRejected(String),

    /// Transport or parse failure talking to the gateway.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidTerm(_) => "INVALID_TERM",
            AppError::DecodeError(_) => "DECODE_ERROR",
            AppError::SignatureMismatch => "SIGNATURE_MISMATCH",
            AppError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            AppError::GatewayRejected(_) => "GATEWAY_REJECTED",
            AppError::Gateway(_) => "GATEWAY_ERROR",
            AppError::RateLimited => "RATE_LIMITED",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidTerm(_) | AppError::DecodeError(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::SignatureMismatch | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::GatewayRejected(_) | AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Internal server error".to_string()
            }
            AppError::Pool(e) => {
                tracing::error!("Connection pool error: {}", e);
                "Internal server error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Gateway(msg) => {
                tracing::error!("Payment gateway error: {}", msg);
                "Payment gateway unavailable".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: message,
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}
