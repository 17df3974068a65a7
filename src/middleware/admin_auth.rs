use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::db::AppState;
use crate::error::AppError;
use crate::util::secrets_match;

/// Require `Authorization: Bearer <ADMIN_TOKEN>`.
///
/// With no admin token configured every request is refused.
pub async fn admin_auth(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let expected = state.admin_token.as_deref().ok_or(AppError::Unauthorized)?;
    let TypedHeader(auth) = auth.ok_or(AppError::Unauthorized)?;

    if !secrets_match(auth.token(), expected) {
        tracing::warn!("Rejected admin request to {}", request.uri().path());
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
