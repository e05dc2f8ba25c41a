use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use cqms_types::models::{QueryStatus, Role, View};

use crate::capability::Capability;

/// Bad user input. Reported back, never changes state.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("All fields are required.")]
    MissingFields,

    #[error("Please enter a valid Email ID.")]
    InvalidEmail,

    #[error("Attachment is not valid base64.")]
    AttachmentEncoding,

    #[error("Attachment exceeds the {max} byte limit.")]
    AttachmentTooLarge { max: usize },

    #[error("Only PNG and JPEG screenshots are accepted.")]
    AttachmentType,

    #[error("Status cannot change from {from} to {to}.")]
    StatusTransition { from: QueryStatus, to: QueryStatus },

    #[error("Items per page must be one of 5, 10, 20 or 50.")]
    PageSize,

    /// Body, query string or path that could not be parsed.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

/// Credential and session failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials. Please try again.")]
    InvalidCredentials,

    #[error("Username already exists. Please choose a different one.")]
    UsernameTaken,

    #[error("All fields are required.")]
    MissingFields,

    #[error("Please log in to continue.")]
    Unauthenticated,
}

/// Error type for every controller operation and HTTP handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{role} accounts cannot {capability}.")]
    Forbidden { role: Role, capability: Capability },

    #[error("Cannot {action} from the {view:?} view.")]
    InvalidTransition { view: View, action: &'static str },

    #[error("Query not found.")]
    NotFound,

    /// Store unreachable or a statement failed.
    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ValidationError::MalformedRequest(rejection.body_text()).into()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ValidationError::MalformedRequest(rejection.body_text()).into()
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ValidationError::MalformedRequest(rejection.body_text()).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            ApiError::Auth(e) => {
                let status = match e {
                    AuthError::InvalidCredentials | AuthError::Unauthenticated => {
                        StatusCode::UNAUTHORIZED
                    }
                    AuthError::UsernameTaken => StatusCode::CONFLICT,
                    AuthError::MissingFields => StatusCode::BAD_REQUEST,
                };
                (status, "AUTH_ERROR", e.to_string())
            }
            ApiError::Forbidden { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),
            ApiError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, "INVALID_TRANSITION", self.to_string())
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            ApiError::Store(e) => {
                error!(error = %e, "Store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "The query store is unavailable. Please try again.".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
