use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::license::{ActivationToken, Term};

/// How a token came to exist.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TokenSource {
    Trial,
    Order,
    Admin,
}

/// A persisted activation token. Rows are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: i64,
    pub identity: String,
    pub term: Term,
    pub purchase_time: i64,
    pub signature: String,
    /// Encoded token string as handed to the holder
    pub token: String,
    pub source: TokenSource,
    pub out_trade_no: Option<String>,
    pub created_at: i64,
}

impl TokenRecord {
    pub fn activation_token(&self) -> ActivationToken {
        ActivationToken {
            identity: self.identity.clone(),
            term: self.term,
            purchase_time: self.purchase_time,
            signature: self.signature.clone(),
        }
    }
}
