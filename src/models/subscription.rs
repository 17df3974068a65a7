use serde::{Deserialize, Serialize};

/// Derived from an identity's valid tokens; rewritten on every recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub identity: String,
    pub expire_at: i64,
    pub is_lifetime: bool,
    pub updated_at: i64,
}
