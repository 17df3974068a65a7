//! Shared test fixtures: a throwaway SQLite file, a fresh issuer key and a
//! scripted payment gateway.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};
use tempfile::TempDir;

use licensor::config::{Prices, RateLimitBackend};
use licensor::db::{self, AppState, DbPool};
use licensor::error::{AppError, Result};
use licensor::license::{LicenseKeys, Term};
use licensor::models::Order;
use licensor::payments::{
    GatewayOrder, GatewayOrderRequest, GatewayTradeStatus, PaymentGateway, sign_params,
};
use licensor::rate_limit::{
    FixedWindow, InMemoryRateLimiter, RateLimitKey, RateLimiter, SqliteRateLimiter,
};
use licensor::service::{Licensor, LicensorSettings, OrderOutcome, OrderRequest};

pub const GATEWAY_KEY: &str = "test-gateway-key";
pub const ADMIN_TOKEN: &str = "test-admin-token";
pub const NOTIFY_URL: &str = "http://localhost:3000/notify";

/// 2023-01-01T00:00:00Z
pub const T0: i64 = 1_672_531_200;
pub const DAY: i64 = 86_400;

/// Gateway double. Accepts every order unless told to reject, and reports
/// orders unpaid until `mark_paid` is called.
#[derive(Default)]
pub struct FakeGateway {
    reject: AtomicBool,
    paid: AtomicBool,
    create_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn reject_orders(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    pub fn mark_paid(&self) {
        self.paid.store(true, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject.load(Ordering::SeqCst) {
            return Err(AppError::GatewayRejected("merchant disabled".into()));
        }
        Ok(GatewayOrder {
            trade_no: Some(format!("GW{}", request.out_trade_no)),
            pay_url: Some(format!("https://pay.example.com/{}", request.out_trade_no)),
            qrcode: None,
            img: None,
        })
    }

    async fn query_order(&self, out_trade_no: &str) -> Result<GatewayTradeStatus> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        let paid = self.paid.load(Ordering::SeqCst);
        Ok(GatewayTradeStatus {
            paid,
            trade_no: paid.then(|| format!("GW{}", out_trade_no)),
        })
    }
}

/// Everything a test needs. Holds the temp dir so the database outlives
/// the test body.
pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    _dir: TempDir,
}

impl TestApp {
    pub fn licensor(&self) -> &Licensor {
        &self.state.licensor
    }

    pub fn db(&self) -> &DbPool {
        self.state.db()
    }

    pub fn router(&self) -> axum::Router {
        licensor::app(self.state.clone())
    }
}

pub fn test_prices() -> Prices {
    Prices {
        monthly: "9.90".into(),
        yearly: "99.00".into(),
        lifetime: "199.00".into(),
    }
}

/// Test app with a limit high enough that no test trips it.
pub fn create_test_app() -> TestApp {
    build_test_app(FixedWindow::new(10_000, 60), RateLimitBackend::Memory, Some(ADMIN_TOKEN))
}

pub fn create_test_app_with_limit(policy: FixedWindow) -> TestApp {
    build_test_app(policy, RateLimitBackend::Memory, Some(ADMIN_TOKEN))
}

pub fn create_test_app_without_admin() -> TestApp {
    build_test_app(FixedWindow::new(10_000, 60), RateLimitBackend::Memory, None)
}

pub fn create_test_app_with_gateway_key(gateway_key: &str) -> TestApp {
    build_test_app_with_key(
        FixedWindow::new(10_000, 60),
        RateLimitBackend::Memory,
        Some(ADMIN_TOKEN),
        gateway_key,
    )
}

pub fn build_test_app(
    policy: FixedWindow,
    backend: RateLimitBackend,
    admin_token: Option<&str>,
) -> TestApp {
    build_test_app_with_key(policy, backend, admin_token, GATEWAY_KEY)
}

fn build_test_app_with_key(
    policy: FixedWindow,
    backend: RateLimitBackend,
    admin_token: Option<&str>,
    gateway_key: &str,
) -> TestApp {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("licensor.db");
    let pool = db::create_pool(path.to_str().unwrap(), 8).unwrap();
    db::init_db(&pool.get().unwrap()).unwrap();

    let gateway = Arc::new(FakeGateway::default());
    let licensor = Licensor::new(
        pool.clone(),
        LicenseKeys::generate(),
        gateway.clone(),
        LicensorSettings {
            gateway_key: gateway_key.into(),
            notify_url: NOTIFY_URL.into(),
            prices: test_prices(),
        },
    );

    let rate_limiter: Arc<dyn RateLimiter> = match backend {
        RateLimitBackend::Memory => Arc::new(InMemoryRateLimiter::new(policy)),
        RateLimitBackend::Sqlite => Arc::new(SqliteRateLimiter::new(policy, pool)),
    };

    TestApp {
        state: AppState {
            licensor: Arc::new(licensor),
            rate_limiter,
            rate_limit_key: RateLimitKey::ClientIp,
            admin_token: admin_token.map(Arc::from),
        },
        gateway,
        _dir: dir,
    }
}

/// Create a paid-term order through the service and return the pending row.
pub async fn create_pending_order(app: &TestApp, identity: &str, term: Term) -> Order {
    let outcome = app
        .licensor()
        .create_order(OrderRequest {
            identity: identity.into(),
            term,
            pay_type: None,
            client_ip: Some("127.0.0.1".into()),
        })
        .await
        .unwrap();
    match outcome {
        OrderOutcome::Pending { order, .. } => order,
        other => panic!("expected a pending order, got {:?}", other),
    }
}

/// Callback parameters as the gateway sends them, signed with `key`.
pub fn signed_callback(out_trade_no: &str, trade_status: &str, key: &str) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = vec![
        ("pid".into(), "1001".into()),
        ("trade_no".into(), format!("GW{}", out_trade_no)),
        ("out_trade_no".into(), out_trade_no.into()),
        ("type".into(), "alipay".into()),
        ("name".into(), "VIP1m".into()),
        ("money".into(), "9.90".into()),
        ("trade_status".into(), trade_status.into()),
    ];
    let sign = sign_params(params.clone(), key);
    params.push(("sign".into(), sign));
    params.push(("sign_type".into(), "MD5".into()));
    params
}

/// `k=v&...` without escaping; callback values in tests are URL-safe.
pub fn to_query_string(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub fn token_count(app: &TestApp, identity: &str) -> i64 {
    let conn = app.db().get().unwrap();
    db::queries::count_tokens_for_identity(&conn, identity).unwrap()
}
