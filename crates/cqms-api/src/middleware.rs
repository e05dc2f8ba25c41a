use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use cqms_types::api::Claims;

use crate::auth::AppState;
use crate::error::{ApiResult, AuthError};

/// Extract and validate the JWT from the Authorization header, then check
/// that the session it names is still live.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or(AuthError::Unauthenticated)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        AuthError::Unauthenticated
    })?;

    let claims = token_data.claims;
    let live = state
        .sessions
        .get(claims.sid)
        .and_then(|s| s.user().map(|u| u.id == claims.sub))
        .unwrap_or(false);
    if !live {
        return Err(AuthError::Unauthenticated.into());
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
