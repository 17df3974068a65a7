//! Transport-agnostic core operations.
//!
//! `Licensor` owns the store handle, the issuer key pair and the gateway
//! client. HTTP handlers and the CLI both call into it; neither re-implements
//! any of these flows.

mod orders;
mod subscription;
mod trial;

pub use orders::*;
pub use subscription::*;
pub use trial::*;

use std::sync::Arc;

use chrono::Utc;

use crate::config::Prices;
use crate::db::{DbPool, queries};
use crate::error::{AppError, Result};
use crate::license::{ActivationToken, LicenseKeys, Term};
use crate::models::{TokenRecord, TokenSource};
use crate::payments::PaymentGateway;

const MAX_IDENTITY_LEN: usize = 128;

/// Settings the core needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct LicensorSettings {
    /// Shared secret for verifying gateway callbacks
    pub gateway_key: String,
    /// Callback URL handed to the gateway with each order
    pub notify_url: String,
    pub prices: Prices,
}

pub struct Licensor {
    db: DbPool,
    keys: LicenseKeys,
    gateway: Arc<dyn PaymentGateway>,
    settings: LicensorSettings,
}

impl Licensor {
    pub fn new(
        db: DbPool,
        keys: LicenseKeys,
        gateway: Arc<dyn PaymentGateway>,
        settings: LicensorSettings,
    ) -> Self {
        Self {
            db,
            keys,
            gateway,
            settings,
        }
    }

    pub fn db(&self) -> &DbPool {
        &self.db
    }

    pub fn keys(&self) -> &LicenseKeys {
        &self.keys
    }

    pub fn public_key_hex(&self) -> String {
        self.keys.public_key_hex()
    }

    fn mint(&self, identity: &str, term: Term, purchase_time_ms: i64) -> ActivationToken {
        ActivationToken::mint(identity, term, purchase_time_ms, self.keys.signing_key())
    }

    /// Manual grant: mint and store a token without any payment.
    ///
    /// `purchase_time_ms` defaults to now. The subscription is recomputed
    /// afterwards; a failure there is logged and left for the next query.
    pub fn issue_token(
        &self,
        identity: &str,
        term: Term,
        purchase_time_ms: Option<i64>,
    ) -> Result<TokenRecord> {
        let identity = validate_identity(identity)?;
        let purchase_time_ms = purchase_time_ms.unwrap_or_else(|| Utc::now().timestamp_millis());
        if purchase_time_ms < 0 {
            return Err(AppError::BadRequest("Purchase time must not be negative".into()));
        }

        let token = self.mint(identity, term, purchase_time_ms);
        let record = {
            let conn = self.db.get()?;
            queries::insert_token(&conn, &token, TokenSource::Admin, None)?
        };

        tracing::info!(
            "Issued {} token for {} (purchase_time={})",
            term,
            identity,
            record.purchase_time
        );
        self.recompute_after_write(identity);
        Ok(record)
    }

    /// Check one token string against an identity with this issuer's key.
    pub fn verify_token(&self, identity: &str, token: &str) -> bool {
        ActivationToken::decode(identity, token)
            .map(|t| t.verify(self.keys.verifying_key()))
            .unwrap_or(false)
    }

    fn recompute_after_write(&self, identity: &str) {
        if let Err(e) = self.recompute_subscription(identity) {
            tracing::warn!(
                "Subscription recompute for {} failed, will retry on next query: {}",
                identity,
                e
            );
        }
    }
}

/// Trimmed, non-empty, bounded identity.
pub fn validate_identity(identity: &str) -> Result<&str> {
    let identity = identity.trim();
    if identity.is_empty() {
        return Err(AppError::BadRequest("identity is required".into()));
    }
    if identity.len() > MAX_IDENTITY_LEN {
        return Err(AppError::BadRequest(format!(
            "identity must be at most {} bytes",
            MAX_IDENTITY_LEN
        )));
    }
    Ok(identity)
}
