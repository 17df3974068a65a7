use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::service::SubscriptionView;

#[derive(Debug, Deserialize)]
pub struct IdentityQuery {
    pub identity: String,
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Query(query): Query<IdentityQuery>,
) -> Result<Json<SubscriptionView>> {
    let view = state
        .licensor
        .query_subscription(&query.identity, Utc::now().timestamp())?;
    Ok(Json(view))
}

#[derive(Debug, Serialize)]
pub struct TrialStatusResponse {
    pub identity: String,
    pub used: bool,
}

pub async fn trial_status(
    State(state): State<AppState>,
    Query(query): Query<IdentityQuery>,
) -> Result<Json<TrialStatusResponse>> {
    let used = state.licensor.has_used_trial(&query.identity)?;
    Ok(Json(TrialStatusResponse {
        identity: query.identity,
        used,
    }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub identity: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    /// No reason is given for invalid tokens.
    pub valid: bool,
}

pub async fn verify_token(
    State(state): State<AppState>,
    Json(body): Json<VerifyBody>,
) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        valid: state.licensor.verify_token(&body.identity, &body.token),
    })
}

#[derive(Debug, Serialize)]
pub struct PublicKeyResponse {
    /// Hex compressed SEC1 secp256k1 key for offline verification
    pub public_key: String,
}

pub async fn public_key(State(state): State<AppState>) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        public_key: state.licensor.public_key_hex(),
    })
}
