use axum::{Extension, Json, extract::State};

use cqms_types::api::{Claims, DashboardResponse};

use crate::auth::{AppState, blocking};
use crate::capability;
use crate::error::{ApiResult, AuthError};
use crate::summary;

/// GET /dashboard — the three chart series over the caller's visible queries.
pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<DashboardResponse>> {
    let session = state.sessions.get(claims.sid).ok_or(AuthError::Unauthenticated)?;
    let owner = capability::visible_owner(session.require_user()?);

    let st = state.clone();
    let records = blocking(move || Ok(st.db.list_query_records(owner)?)).await?;

    Ok(Json(summary::summarize(&records)))
}
