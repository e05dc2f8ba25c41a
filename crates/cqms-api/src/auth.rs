use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info, warn};
use uuid::Uuid;

use cqms_db::Database;
use cqms_types::api::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, ScreenParams,
    ScreenResponse, SectionRequest, SessionResponse,
};
use cqms_types::models::User;

use crate::error::{ApiError, ApiResult, AuthError};
use crate::extract::{JsonBody, QueryParams};
use crate::session::{Session, SessionStore};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub sessions: SessionStore,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: String, token_ttl: chrono::Duration) -> Self {
        Self {
            db,
            sessions: SessionStore::new(),
            jwt_secret,
            token_ttl,
        }
    }
}

/// Runs store work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.to_string())
    })?
}

/// GET /auth/screen — the pre-login form to show: login, or registration
/// when `register=true`.
pub async fn login_screen(
    WithRejection(Query(params), _): QueryParams<ScreenParams>,
) -> Json<ScreenResponse> {
    let mut session = Session::default();
    if params.register {
        session.show_registration();
    } else {
        session.hide_registration();
    }
    Json(ScreenResponse {
        screen: session.screen(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.trim().to_string();
    if username.is_empty() || req.password.is_empty() {
        return Err(AuthError::MissingFields.into());
    }

    let st = state.clone();
    let name = username.clone();
    let user_id = blocking(move || {
        if st.db.user_exists(&name)? {
            return Err(AuthError::UsernameTaken.into());
        }
        let digest = cqms_crypto::password_digest(&req.password);
        // The pre-check can race another registration; the UNIQUE constraint decides.
        st.db
            .register_user(&name, &digest, req.role)?
            .ok_or_else(|| AuthError::UsernameTaken.into())
    })
    .await?;

    info!(user_id, username = %username, role = %req.role, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id,
            username,
            role: req.role,
            // Back to the login form.
            screen: Session::default().screen(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    // Registration stores the trimmed name, so look it up the same way.
    let username = req.username.trim().to_string();
    let st = state.clone();
    let name = username.clone();
    let user = blocking(move || Ok(st.db.authenticate(&name, &req.password)?)).await?;

    let Some(user) = user else {
        warn!(username = %username, "Rejected login");
        return Err(AuthError::InvalidCredentials.into());
    };

    let mut session = Session::default();
    session.login(user.clone());
    let screen = session.screen();
    let expires_at = Utc::now() + state.token_ttl;
    let sid = state.sessions.create(session, expires_at);

    let token = match create_token(&state, &user, sid, expires_at) {
        Ok(token) => token,
        Err(e) => {
            state.sessions.remove(sid);
            return Err(ApiError::Internal(format!("token encoding failed: {}", e)));
        }
    };

    info!(
        user_id = user.id,
        role = %user.role,
        live_sessions = state.sessions.live_count(),
        "User logged in"
    );

    Ok(Json(LoginResponse {
        user_id: user.id,
        username: user.username,
        role: user.role,
        token,
        screen,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    if state.sessions.remove(claims.sid).is_some() {
        info!(user_id = claims.sub, "User logged out");
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state
        .sessions
        .get(claims.sid)
        .ok_or(AuthError::Unauthenticated)?;
    session_response(&session).map(Json)
}

/// Sidebar navigation between the dashboard and the query screens.
pub async fn set_section(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<SectionRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state
        .sessions
        .update(claims.sid, |session| {
            session.set_section(req.section);
            session.clone()
        })
        .ok_or(AuthError::Unauthenticated)?;
    session_response(&session).map(Json)
}

fn session_response(session: &Session) -> ApiResult<SessionResponse> {
    let user = session.require_user()?;
    Ok(SessionResponse {
        user_id: user.id,
        username: user.username.clone(),
        role: user.role,
        section: session.section(),
        screen: session.screen(),
    })
}

fn create_token(
    state: &AppStateInner,
    user: &User,
    sid: Uuid,
    expires_at: DateTime<Utc>,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        role: user.role,
        sid,
        exp: expires_at.timestamp().max(0) as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}
