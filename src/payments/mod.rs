mod epay;
mod signature;

pub use epay::*;
pub use signature::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Trade status the gateway reports for a completed payment.
pub const TRADE_SUCCESS: &str = "TRADE_SUCCESS";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrderRequest {
    pub out_trade_no: String,
    pub name: String,
    /// Decimal amount as the gateway expects it, e.g. "9.90"
    pub money: String,
    /// Payment channel, e.g. "alipay" or "wxpay"
    pub pay_type: String,
    pub notify_url: String,
    pub client_ip: Option<String>,
}

/// What the payer needs to complete a payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub trade_no: Option<String>,
    pub pay_url: Option<String>,
    pub qrcode: Option<String>,
    pub img: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayTradeStatus {
    pub paid: bool,
    pub trade_no: Option<String>,
}

/// Outbound half of the gateway integration.
///
/// Implementations make a single bounded attempt per call; there is no retry.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register an order with the gateway. A decline is `GatewayRejected`.
    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder>;

    async fn query_order(&self, out_trade_no: &str) -> Result<GatewayTradeStatus>;
}

/// An inbound payment callback whose signature has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    pub out_trade_no: String,
    pub trade_no: String,
    pub trade_status: String,
    pub money: Option<String>,
}

impl PaymentNotification {
    pub fn is_success(&self) -> bool {
        self.trade_status == TRADE_SUCCESS
    }
}

/// Verify and parse callback parameters.
///
/// Nothing from the payload is trusted until the signature checks out; on a
/// mismatch only the claimed order number and status are logged.
pub fn verify_notification(params: &[(String, String)], key: &str) -> Result<PaymentNotification> {
    let get = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty())
    };

    if !verify_params(params, key) {
        tracing::warn!(
            "Rejected payment callback with bad signature: out_trade_no={:?}, trade_status={:?}",
            get("out_trade_no"),
            get("trade_status"),
        );
        return Err(AppError::SignatureMismatch);
    }

    let out_trade_no =
        get("out_trade_no").ok_or_else(|| AppError::BadRequest("Missing out_trade_no".into()))?;
    Ok(PaymentNotification {
        out_trade_no,
        trade_no: get("trade_no").unwrap_or_default(),
        trade_status: get("trade_status").unwrap_or_default(),
        money: get("money"),
    })
}
