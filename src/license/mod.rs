//! Activation tokens: minting, the string format, verification, and folding a
//! holder's tokens into a subscription.
//!
//! A token proves that `identity` bought `term` at `purchase_time`. The issuer
//! signs `identity|purchase_time|term` (purchase time in unix seconds), so
//! changing any of the three invalidates it. The identity itself is not part of
//! the token string; verifiers supply it.

mod accumulator;
pub mod codec;
mod signing;
mod term;

pub use accumulator::{
    Accumulation, SubscriptionStatus, accumulate, add_calendar_years, term_duration,
};
pub use codec::DecodedToken;
pub use signing::{LicenseKeys, public_key_from_hex, public_key_to_hex, sign, verify};
pub use term::Term;

use k256::ecdsa::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The exact bytes covered by a license signature.
pub fn license_message(identity: &str, purchase_time_secs: i64, term: Term) -> String {
    format!("{}|{}|{}", identity, purchase_time_secs, term.code())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationToken {
    pub identity: String,
    pub term: Term,
    /// Unix seconds.
    pub purchase_time: i64,
    /// Hex DER ECDSA signature.
    pub signature: String,
}

impl ActivationToken {
    /// Sign a new token. `purchase_time_ms` is truncated to whole seconds.
    pub fn mint(identity: &str, term: Term, purchase_time_ms: i64, key: &SigningKey) -> Self {
        let purchase_time = purchase_time_ms.div_euclid(1000);
        let signature = sign(
            license_message(identity, purchase_time, term).as_bytes(),
            key,
        );
        Self {
            identity: identity.to_string(),
            term,
            purchase_time,
            signature,
        }
    }

    pub fn message(&self) -> String {
        license_message(&self.identity, self.purchase_time, self.term)
    }

    pub fn verify(&self, key: &VerifyingKey) -> bool {
        verify(self.message().as_bytes(), &self.signature, key)
    }

    /// Token string handed to the holder.
    pub fn encode(&self) -> Result<String> {
        codec::encode(self.purchase_time * 1000, self.term, &self.signature)
    }

    /// Parse a token string for `identity`. Does not verify the signature.
    pub fn decode(identity: &str, token: &str) -> Result<Self> {
        let decoded = codec::decode(token)?;
        Ok(Self {
            identity: identity.to_string(),
            term: decoded.term,
            purchase_time: decoded.purchase_time_secs(),
            signature: decoded.signature_hex,
        })
    }
}

/// Offline check of a holder's token strings, as a verifying client does it.
///
/// Undecodable or badly signed tokens are ignored; the rest are folded and
/// evaluated at `now` (unix seconds).
pub fn check_tokens<S: AsRef<str>>(
    identity: &str,
    tokens: &[S],
    key: &VerifyingKey,
    now: i64,
) -> SubscriptionStatus {
    let valid: Vec<ActivationToken> = tokens
        .iter()
        .filter_map(|t| ActivationToken::decode(identity, t.as_ref()).ok())
        .filter(|t| t.verify(key))
        .collect();
    accumulate(&valid).evaluate(now)
}
