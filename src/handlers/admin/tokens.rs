use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::license::Term;

#[derive(Debug, Deserialize)]
pub struct IssueTokenBody {
    pub identity: String,
    pub term: String,
    /// Defaults to now. Milliseconds since the epoch, truncated to seconds.
    #[serde(default)]
    pub purchase_time_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct IssuedToken {
    pub identity: String,
    pub term: Term,
    pub purchase_time: i64,
    pub token: String,
}

/// Manual grant, bypassing payment.
pub async fn issue_token(
    State(state): State<AppState>,
    Json(body): Json<IssueTokenBody>,
) -> Result<Json<IssuedToken>> {
    let term = Term::from_code(&body.term)?;
    let record = state
        .licensor
        .issue_token(&body.identity, term, body.purchase_time_ms)?;

    Ok(Json(IssuedToken {
        identity: record.identity,
        term: record.term,
        purchase_time: record.purchase_time,
        token: record.token,
    }))
}
