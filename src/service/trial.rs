use chrono::Utc;
use serde::Serialize;

use crate::db::queries::{self, TrialGrant};
use crate::error::Result;
use crate::license::Term;

use super::{Licensor, validate_identity};

#[derive(Debug, Clone, Serialize)]
pub struct TrialOutcome {
    pub token: String,
    /// False when an earlier grant's token is being returned again.
    pub newly_granted: bool,
}

impl Licensor {
    pub fn has_used_trial(&self, identity: &str) -> Result<bool> {
        let identity = validate_identity(identity)?;
        let conn = self.db.get()?;
        queries::trial_exists(&conn, identity)
    }

    /// Grant the one free trial for `identity`, first write wins.
    ///
    /// Repeat calls return the token minted by the first one; no second trial
    /// record or token is ever created.
    pub fn grant_trial(&self, identity: &str) -> Result<TrialOutcome> {
        let identity = validate_identity(identity)?;

        let grant = {
            let mut conn = self.db.get()?;
            queries::grant_trial_atomic(&mut conn, identity, || {
                self.mint(identity, Term::Trial, Utc::now().timestamp_millis())
            })?
        };

        match grant {
            TrialGrant::Granted(record) => {
                tracing::info!("Granted trial to {}", identity);
                self.recompute_after_write(identity);
                Ok(TrialOutcome {
                    token: record.token,
                    newly_granted: true,
                })
            }
            TrialGrant::Existing(token) => {
                tracing::debug!("Trial already used by {}, returning existing token", identity);
                Ok(TrialOutcome {
                    token,
                    newly_granted: false,
                })
            }
        }
    }
}
