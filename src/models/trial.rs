use serde::{Deserialize, Serialize};

/// Marks that an identity has had its one free trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    pub identity: String,
    /// The trial token issued with this record, returned again on repeat requests
    pub token: String,
    pub created_at: i64,
}
