use axum::{extract::State, http::HeaderMap};
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::license::Term;
use crate::models::OrderStatus;
use crate::service::{OrderOutcome, OrderRequest};
use crate::util::client_ip;

#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    pub identity: String,
    /// Term code: `7d`, `1m`, `1y` or `Lifetime`
    pub term: String,
    #[serde(default)]
    pub pay_type: Option<String>,
}

pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderBody>,
) -> Result<Json<OrderOutcome>> {
    let term = Term::from_code(&body.term)?;
    let outcome = state
        .licensor
        .create_order(OrderRequest {
            identity: body.identity,
            term,
            pay_type: body.pay_type,
            client_ip: client_ip(&headers),
        })
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    pub out_trade_no: String,
    pub status: OrderStatus,
    pub term: Term,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
}

/// Polling endpoint. Asks the gateway at most once per call while pending.
pub async fn order_status(
    State(state): State<AppState>,
    Path(out_trade_no): Path<String>,
) -> Result<Json<OrderStatusResponse>> {
    let current = state.licensor.query_status(&out_trade_no).await?;
    Ok(Json(OrderStatusResponse {
        out_trade_no: current.order.out_trade_no,
        status: current.order.status,
        term: current.order.term,
        amount: current.order.amount,
        token: current.token,
        paid_at: current.order.paid_at,
    }))
}
