use serde::Serialize;

use crate::db::queries;
use crate::error::Result;
use crate::license::{ActivationToken, Accumulation, SubscriptionStatus, accumulate};

use super::{Licensor, validate_identity};

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    pub identity: String,
    #[serde(flatten)]
    pub status: SubscriptionStatus,
    /// Every validly signed token for the identity, oldest purchase first
    pub tokens: Vec<String>,
}

impl Licensor {
    /// Rebuild the identity's subscription record from its stored tokens.
    ///
    /// Tokens whose signature does not verify with the current key are
    /// skipped and logged. The record is overwritten, never patched.
    pub fn recompute_subscription(&self, identity: &str) -> Result<(Accumulation, Vec<String>)> {
        let conn = self.db.get()?;
        let records = queries::list_tokens_for_identity(&conn, identity)?;

        let mut valid: Vec<ActivationToken> = Vec::with_capacity(records.len());
        let mut strings = Vec::with_capacity(records.len());
        for record in records {
            let token = record.activation_token();
            if token.verify(self.keys.verifying_key()) {
                valid.push(token);
                strings.push(record.token);
            } else {
                tracing::warn!(
                    "Skipping token {} for {}: signature does not verify",
                    record.id,
                    identity
                );
            }
        }

        let acc = accumulate(&valid);
        queries::upsert_subscription(&conn, identity, acc.expire_at, acc.is_lifetime)?;
        Ok((acc, strings))
    }

    /// Current validity for `identity` at `now` (unix seconds).
    ///
    /// Always recomputes first, which also repairs a record left stale by an
    /// earlier failed update.
    pub fn query_subscription(&self, identity: &str, now: i64) -> Result<SubscriptionView> {
        let identity = validate_identity(identity)?;
        let (acc, tokens) = self.recompute_subscription(identity)?;
        let status = acc.evaluate(now);
        if status.clock_tampered {
            tracing::warn!(
                "Token for {} has a purchase time after now ({}); reporting not valid",
                identity,
                now
            );
        }
        Ok(SubscriptionView {
            identity: identity.to_string(),
            status,
            tokens,
        })
    }
}
