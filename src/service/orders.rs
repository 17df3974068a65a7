use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::db::queries::{self, PaymentConfirmation};
use crate::error::{AppError, Result};
use crate::license::Term;
use crate::models::{CreateOrder, Order};
use crate::payments::{GatewayOrder, GatewayOrderRequest, verify_notification};

use super::{Licensor, validate_identity};

const DEFAULT_PAY_TYPE: &str = "alipay";

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub identity: String,
    pub term: Term,
    /// Gateway payment channel; defaults to alipay
    pub pay_type: Option<String>,
    pub client_ip: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderOutcome {
    /// Trial requests skip payment and return a token straight away.
    Trial { token: String, newly_granted: bool },
    /// A pending order registered with the gateway.
    Pending {
        order: Order,
        payment: GatewayOrder,
    },
}

/// Order state as seen by a caller, with the token once paid.
#[derive(Debug, Clone, Serialize)]
pub struct OrderState {
    pub order: Order,
    pub token: Option<String>,
    /// True only for the call that performed the paid transition.
    pub newly_paid: bool,
}

/// Result of processing a gateway callback.
#[derive(Debug, Clone)]
pub enum NotifyOutcome {
    /// Signed callback for a non-success status; nothing applied.
    Ignored { out_trade_no: String, trade_status: String },
    Confirmed(OrderState),
}

/// Timestamp prefix plus random suffix, alphanumeric, 26 chars.
pub fn generate_out_trade_no() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}{}", Utc::now().format("%Y%m%d%H%M%S"), &suffix[..12])
}

fn validate_pay_type(pay_type: Option<&str>) -> Result<String> {
    let pay_type = pay_type.map(str::trim).filter(|p| !p.is_empty());
    match pay_type {
        None => Ok(DEFAULT_PAY_TYPE.to_string()),
        Some(p) if p.len() <= 16 && p.bytes().all(|b| b.is_ascii_alphanumeric()) => {
            Ok(p.to_string())
        }
        Some(p) => Err(AppError::BadRequest(format!("Invalid pay type: {}", p))),
    }
}

impl Licensor {
    /// Start a purchase.
    ///
    /// Trials bypass payment entirely. Paid terms are registered with the
    /// gateway first and stored as pending only if the gateway accepts them,
    /// so a declined attempt leaves nothing behind.
    pub async fn create_order(&self, request: OrderRequest) -> Result<OrderOutcome> {
        let identity = validate_identity(&request.identity)?.to_string();

        if request.term.is_trial() {
            let trial = self.grant_trial(&identity)?;
            return Ok(OrderOutcome::Trial {
                token: trial.token,
                newly_granted: trial.newly_granted,
            });
        }

        let amount = self
            .settings
            .prices
            .for_term(request.term)
            .ok_or_else(|| AppError::InvalidTerm(request.term.to_string()))?
            .to_string();
        let pay_type = validate_pay_type(request.pay_type.as_deref())?;
        let out_trade_no = generate_out_trade_no();

        let gateway_request = GatewayOrderRequest {
            out_trade_no: out_trade_no.clone(),
            name: request.term.product_name().to_string(),
            money: amount.clone(),
            pay_type,
            notify_url: self.settings.notify_url.clone(),
            client_ip: request.client_ip,
        };

        let payment = match self.gateway.create_order(&gateway_request).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(
                    "Gateway did not accept order {} for {}: {}",
                    out_trade_no,
                    identity,
                    e
                );
                return Err(e);
            }
        };

        let order = {
            let conn = self.db.get()?;
            queries::create_order(
                &conn,
                &CreateOrder {
                    out_trade_no,
                    identity,
                    term: request.term,
                    amount,
                },
            )?
        };

        tracing::info!(
            "Created order {} for {} ({}, {})",
            order.out_trade_no,
            order.identity,
            order.term,
            order.amount
        );
        Ok(OrderOutcome::Pending { order, payment })
    }

    /// Idempotent `pending -> paid` transition.
    ///
    /// The first caller for an order mints its token and recomputes the
    /// subscription. Every later caller (webhook replay, polling) gets the
    /// already-paid state back with no writes.
    pub fn confirm_payment(
        &self,
        out_trade_no: &str,
        gateway_trade_no: Option<&str>,
    ) -> Result<OrderState> {
        let gateway_trade_no = gateway_trade_no.filter(|t| !t.is_empty());

        let confirmation = {
            let mut conn = self.db.get()?;
            queries::confirm_payment_atomic(
                &mut conn,
                out_trade_no,
                gateway_trade_no,
                |order, paid_at| self.mint(&order.identity, order.term, paid_at * 1000),
            )?
        };

        match confirmation {
            PaymentConfirmation::Confirmed { order, token } => {
                tracing::info!(
                    "Order {} paid (gateway trade {:?}), issued {} token to {}",
                    order.out_trade_no,
                    order.gateway_trade_no,
                    order.term,
                    order.identity
                );
                self.recompute_after_write(&order.identity);
                Ok(OrderState {
                    order,
                    token: Some(token.token),
                    newly_paid: true,
                })
            }
            PaymentConfirmation::AlreadyPaid { order, token } => {
                tracing::debug!("Order {} already paid, nothing to do", out_trade_no);
                Ok(OrderState {
                    order,
                    token: token.map(|t| t.token),
                    newly_paid: false,
                })
            }
        }
    }

    /// Poll an order. Paid orders answer from the store; pending ones ask the
    /// gateway once and confirm if it reports success.
    pub async fn query_status(&self, out_trade_no: &str) -> Result<OrderState> {
        let order = {
            let conn = self.db.get()?;
            let order = queries::get_order(&conn, out_trade_no)?
                .ok_or_else(|| AppError::OrderNotFound(out_trade_no.to_string()))?;
            if order.is_paid() {
                let token = queries::get_token_for_order(&conn, out_trade_no)?;
                return Ok(OrderState {
                    order,
                    token: token.map(|t| t.token),
                    newly_paid: false,
                });
            }
            order
        };

        let remote = self.gateway.query_order(out_trade_no).await?;
        if remote.paid {
            return self.confirm_payment(out_trade_no, remote.trade_no.as_deref());
        }

        Ok(OrderState {
            order,
            token: None,
            newly_paid: false,
        })
    }

    /// Process gateway callback parameters.
    ///
    /// A bad signature stops here with `SignatureMismatch`; the claimed trade
    /// status is never acted on.
    pub fn handle_notification(&self, params: &[(String, String)]) -> Result<NotifyOutcome> {
        let notification = verify_notification(params, &self.settings.gateway_key)?;

        if !notification.is_success() {
            tracing::info!(
                "Callback for {} with status {}, not confirming",
                notification.out_trade_no,
                notification.trade_status
            );
            return Ok(NotifyOutcome::Ignored {
                out_trade_no: notification.out_trade_no,
                trade_status: notification.trade_status,
            });
        }

        let state = self.confirm_payment(
            &notification.out_trade_no,
            Some(notification.trade_no.as_str()),
        )?;
        Ok(NotifyOutcome::Confirmed(state))
    }

    pub fn list_orders(&self, identity: &str) -> Result<Vec<Order>> {
        let identity = validate_identity(identity)?;
        let conn = self.db.get()?;
        queries::list_orders_for_identity(&conn, identity)
    }
}
