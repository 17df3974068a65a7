use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::license::Term;

/// Order lifecycle. `Paid` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Merchant-side order number; the idempotency key for callbacks and polling
    pub out_trade_no: String,
    pub identity: String,
    pub term: Term,
    pub amount: String,
    pub status: OrderStatus,
    pub created_at: i64,
    pub paid_at: Option<i64>,
    pub gateway_trade_no: Option<String>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.status == OrderStatus::Paid
    }
}

#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub out_trade_no: String,
    pub identity: String,
    pub term: Term,
    pub amount: String,
}
