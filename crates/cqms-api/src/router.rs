use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};
use serde_json::json;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{dashboard, queries};

/// Room for a base64-encoded 5 MB screenshot plus the form fields.
const MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

/// All routes, without transport layers (CORS, tracing), which the binary adds.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/screen", get(auth::login_screen))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/session", get(auth::get_session))
        .route("/session/section", put(auth::set_section))
        .route("/queries", get(queries::list_queries).post(queries::submit_query))
        .route("/queries/add", post(queries::begin_add))
        .route("/queries/back", post(queries::back))
        .route("/queries/selected", get(queries::get_selected).put(queries::update_selected))
        .route("/queries/{query_id}/select", post(queries::select_query))
        .route("/queries/{query_id}/attachment", get(queries::get_attachment))
        .route("/dashboard", get(dashboard::get_dashboard))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
