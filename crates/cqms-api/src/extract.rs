//! Extractors whose rejections come back in the `{error, code}` body.

use axum::Json;
use axum::extract::{Path, Query};
use axum_extra::extract::WithRejection;

use crate::error::ApiError;

pub type JsonBody<T> = WithRejection<Json<T>, ApiError>;
pub type QueryParams<T> = WithRejection<Query<T>, ApiError>;
pub type PathParam<T> = WithRejection<Path<T>, ApiError>;
