use std::env;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::license::{LicenseKeys, Term};
use crate::rate_limit::RateLimitKey;

/// Which rate limiter implementation backs the request gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitBackend {
    /// Per-process map, fine for a single instance.
    Memory,
    /// Shared table in the database, for multiple instances on one store.
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_url: String,
    pub pid: String,
    /// Shared MD5 signing secret issued by the gateway.
    pub key: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Prices {
    pub monthly: String,
    pub yearly: String,
    pub lifetime: String,
}

impl Prices {
    /// Amount charged for a paid term. Trials are never priced.
    pub fn for_term(&self, term: Term) -> Option<&str> {
        match term {
            Term::Trial => None,
            Term::Month => Some(&self.monthly),
            Term::Year => Some(&self.yearly),
            Term::Lifetime => Some(&self.lifetime),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: i64,
    pub key: RateLimitKey,
    pub backend: RateLimitBackend,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_secs: 60,
            key: RateLimitKey::ClientIp,
            backend: RateLimitBackend::Memory,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    pub dev_mode: bool,
    /// Hex-encoded secp256k1 private scalar used to mint activation tokens
    pub license_private_key: Option<String>,
    /// Shared secret for manual grants (admin routes are off when unset)
    pub admin_token: Option<String>,
    pub gateway: GatewayConfig,
    pub prices: Prices,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("LICENSOR_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url = env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let timeout_secs: u64 = env::var("GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let rate_limit = RateLimitConfig {
            max_requests: env::var("RATE_LIMIT_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            window_secs: env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            key: match env::var("RATE_LIMIT_KEY").as_deref() {
                Ok("global") => RateLimitKey::Global,
                _ => RateLimitKey::ClientIp,
            },
            backend: match env::var("RATE_LIMIT_BACKEND").as_deref() {
                Ok("sqlite") => RateLimitBackend::Sqlite,
                _ => RateLimitBackend::Memory,
            },
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "licensor.db".to_string()),
            base_url,
            dev_mode,
            license_private_key: env::var("LICENSE_PRIVATE_KEY").ok(),
            admin_token: env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty()),
            gateway: GatewayConfig {
                api_url: env::var("GATEWAY_URL")
                    .unwrap_or_else(|_| "https://pay.example.com".to_string()),
                pid: env::var("GATEWAY_PID").unwrap_or_default(),
                key: env::var("GATEWAY_KEY").unwrap_or_default(),
                timeout: Duration::from_secs(timeout_secs),
            },
            prices: Prices {
                monthly: env::var("PRICE_1M").unwrap_or_else(|_| "9.90".to_string()),
                yearly: env::var("PRICE_1Y").unwrap_or_else(|_| "99.00".to_string()),
                lifetime: env::var("PRICE_LIFETIME").unwrap_or_else(|_| "199.00".to_string()),
            },
            rate_limit,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Where the gateway should deliver payment callbacks.
    pub fn notify_url(&self) -> String {
        format!("{}/notify", self.base_url.trim_end_matches('/'))
    }

    /// Issuer key pair from `LICENSE_PRIVATE_KEY`.
    ///
    /// In dev mode a missing key is replaced by a throwaway one; tokens minted
    /// with it stop verifying on the next restart.
    pub fn license_keys(&self) -> Result<LicenseKeys> {
        match self.license_private_key.as_deref() {
            Some(hex_key) => LicenseKeys::from_private_hex(hex_key),
            None if self.dev_mode => {
                tracing::warn!("LICENSE_PRIVATE_KEY not set, using an ephemeral dev key");
                Ok(LicenseKeys::generate())
            }
            None => Err(AppError::Internal(
                "LICENSE_PRIVATE_KEY is not set (run `licensor keygen`)".into(),
            )),
        }
    }

    /// Settings the server cannot run safely without.
    pub fn validate_for_serve(&self) -> Result<()> {
        if self.gateway.key.is_empty() {
            return Err(AppError::Internal(
                "GATEWAY_KEY is not set; payment callbacks could not be verified".into(),
            ));
        }
        Ok(())
    }
}
