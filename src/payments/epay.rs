use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::config::GatewayConfig;
use crate::error::{AppError, Result};

use super::{GatewayOrder, GatewayOrderRequest, GatewayTradeStatus, PaymentGateway, sign_params};

/// Client for an epay-style aggregate gateway (`mapi.php` / `api.php`).
///
/// One attempt per call with the configured timeout. Callers that need
/// another try (the status polling endpoint) simply call again.
#[derive(Debug, Clone)]
pub struct EpayClient {
    client: Client,
    api_url: String,
    pid: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    code: Value,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    trade_no: Option<String>,
    #[serde(default)]
    payurl: Option<String>,
    #[serde(default)]
    qrcode: Option<String>,
    #[serde(default)]
    img: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    code: Value,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    trade_no: Option<String>,
    #[serde(default)]
    status: Option<Value>,
}

/// Gateways send numeric fields either as numbers or strings.
fn is_one(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s.trim() == "1",
        _ => false,
    }
}

impl EpayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            pid: config.pid.clone(),
            key: config.key.clone(),
        })
    }

    /// Signed form body for `mapi.php`.
    pub fn create_params(&self, request: &GatewayOrderRequest) -> Vec<(String, String)> {
        build_create_params(&self.pid, &self.key, request)
    }
}

pub fn build_create_params(
    pid: &str,
    key: &str,
    request: &GatewayOrderRequest,
) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = vec![
        ("pid".into(), pid.to_string()),
        ("type".into(), request.pay_type.clone()),
        ("out_trade_no".into(), request.out_trade_no.clone()),
        ("notify_url".into(), request.notify_url.clone()),
        ("name".into(), request.name.clone()),
        ("money".into(), request.money.clone()),
        ("clientip".into(), request.client_ip.clone().unwrap_or_default()),
    ];
    let sign = sign_params(params.iter().map(|(k, v)| (k.as_str(), v.as_str())), key);
    params.push(("sign".into(), sign));
    params.push(("sign_type".into(), "MD5".into()));
    params
}

#[async_trait]
impl PaymentGateway for EpayClient {
    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder> {
        let params: HashMap<String, String> = self.create_params(request).into_iter().collect();

        let response = self
            .client
            .post(format!("{}/mapi.php", self.api_url))
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("create order request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!("HTTP {}: {}", status, error_text)));
        }

        let body: CreateResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to parse gateway response: {}", e)))?;

        if !is_one(&body.code) {
            return Err(AppError::GatewayRejected(
                body.msg.unwrap_or_else(|| "order declined".into()),
            ));
        }

        Ok(GatewayOrder {
            trade_no: body.trade_no,
            pay_url: body.payurl,
            qrcode: body.qrcode,
            img: body.img,
        })
    }

    async fn query_order(&self, out_trade_no: &str) -> Result<GatewayTradeStatus> {
        let response = self
            .client
            .get(format!("{}/api.php", self.api_url))
            .query(&[
                ("act", "order"),
                ("pid", self.pid.as_str()),
                ("key", self.key.as_str()),
                ("out_trade_no", out_trade_no),
            ])
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("query order request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!("HTTP {}", response.status())));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to parse gateway response: {}", e)))?;

        if !is_one(&body.code) {
            // Unknown orders come back with a non-1 code; treat as not paid yet.
            tracing::debug!(
                "Gateway query for {} returned {:?}: {:?}",
                out_trade_no,
                body.code,
                body.msg
            );
            return Ok(GatewayTradeStatus {
                paid: false,
                trade_no: None,
            });
        }

        Ok(GatewayTradeStatus {
            paid: body.status.as_ref().is_some_and(is_one),
            trade_no: body.trade_no,
        })
    }
}
