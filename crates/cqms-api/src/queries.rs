use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use uuid::Uuid;

use cqms_db::Database;
use cqms_types::api::{
    Claims, CreatedQueryResponse, ListParams, NewQueryRequest, QueryDetailResponse,
    QueryListResponse, UpdateQueryRequest, ViewResponse,
};
use cqms_types::models::Query as ClientQuery;

use crate::auth::{AppState, blocking};
use crate::capability::{self, Capability};
use crate::error::{ApiResult, AuthError};
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::lifecycle;
use crate::session::Session;
use crate::validation;

/// Runs a controller operation against a copy of the caller's session and
/// stores the copy back only if the operation succeeded.
async fn in_session<F, T>(state: &AppState, sid: Uuid, op: F) -> ApiResult<T>
where
    F: FnOnce(&mut Session, &Database) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let mut session = state.sessions.get(sid).ok_or(AuthError::Unauthenticated)?;
    let st = state.clone();
    let (session, result) = blocking(move || {
        let result = op(&mut session, &st.db);
        Ok((session, result))
    })
    .await?;

    if result.is_ok() {
        state.sessions.replace(sid, session);
    }
    result
}

fn detail_response(query: ClientQuery) -> QueryDetailResponse {
    let record = query.record;
    QueryDetailResponse {
        id: record.id,
        email: record.email,
        mobile: record.mobile,
        heading: record.heading,
        description: record.description,
        status: record.status,
        created_at: record.created_at,
        closed_at: record.closed_at,
        attachment: query.attachment.map(|bytes| B64.encode(bytes)),
    }
}

/// GET /queries — visible queries after status filter, search and paging.
pub async fn list_queries(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Query(params), _): QueryParams<ListParams>,
) -> ApiResult<Json<QueryListResponse>> {
    let (role, page) = in_session(&state, claims.sid, move |session, db| {
        let page = lifecycle::list(session, db, &params)?;
        let role = session.require_user()?.role;
        Ok((role, page))
    })
    .await?;

    Ok(Json(QueryListResponse {
        queries: page.rows,
        total: page.total,
        page: page.page,
        per_page: page.per_page,
        total_pages: page.total_pages,
        can_create: capability::allows(role, Capability::CreateQuery),
        can_edit: capability::allows(role, Capability::EditQuery),
    }))
}

/// POST /queries/add — open the add form.
pub async fn begin_add(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ViewResponse>> {
    let outcome = in_session(&state, claims.sid, |session, _| lifecycle::begin_create(session)).await?;
    Ok(Json(ViewResponse { view: outcome.view }))
}

/// POST /queries — submit the add form.
pub async fn submit_query(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<NewQueryRequest>,
) -> ApiResult<impl IntoResponse> {
    let now = chrono::Utc::now();
    let outcome = in_session(&state, claims.sid, move |session, db| {
        lifecycle::submit_new(session, db, &req.form, req.attachment.as_deref(), now)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedQueryResponse {
            id: outcome.value,
            view: outcome.view,
        }),
    ))
}

/// POST /queries/{id}/select — open the detail form for a row.
pub async fn select_query(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(query_id), _): PathParam<i64>,
) -> ApiResult<Json<QueryDetailResponse>> {
    let outcome = in_session(&state, claims.sid, move |session, db| {
        lifecycle::select(session, db, query_id)
    })
    .await?;
    Ok(Json(detail_response(outcome.value)))
}

/// GET /queries/selected
pub async fn get_selected(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<QueryDetailResponse>> {
    let query = in_session(&state, claims.sid, |session, db| lifecycle::selected(session, db)).await?;
    Ok(Json(detail_response(query)))
}

/// PUT /queries/selected — submit the detail form.
pub async fn update_selected(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<UpdateQueryRequest>,
) -> ApiResult<Json<ViewResponse>> {
    let now = chrono::Utc::now();
    let outcome = in_session(&state, claims.sid, move |session, db| {
        lifecycle::submit_update(session, db, &req.form, req.status, now)
    })
    .await?;
    Ok(Json(ViewResponse { view: outcome.view }))
}

/// POST /queries/back
pub async fn back(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ViewResponse>> {
    let outcome = in_session(&state, claims.sid, |session, _| lifecycle::back(session)).await?;
    Ok(Json(ViewResponse { view: outcome.view }))
}

/// GET /queries/{id}/attachment — raw screenshot bytes.
pub async fn get_attachment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(query_id), _): PathParam<i64>,
) -> ApiResult<impl IntoResponse> {
    let bytes = in_session(&state, claims.sid, move |session, db| {
        lifecycle::attachment(session, db, query_id)
    })
    .await?;

    Ok((
        [(header::CONTENT_TYPE, validation::attachment_content_type(&bytes))],
        bytes,
    ))
}
