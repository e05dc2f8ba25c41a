use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{QueryStatus, QuerySummary, Role, Screen, Section, View};

// -- JWT Claims --

/// Claims carried by the bearer token. `sid` names the server-side session,
/// so a token stops working as soon as that session is logged out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub role: Role,
    pub sid: Uuid,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    /// Where the caller goes next: back to the login form.
    pub screen: Screen,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub token: String,
    pub screen: Screen,
}

/// Which pre-login form the caller is on.
#[derive(Debug, Default, Deserialize)]
pub struct ScreenParams {
    #[serde(default)]
    pub register: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScreenResponse {
    pub screen: Screen,
}

// -- Session --

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub section: Section,
    pub screen: Screen,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionRequest {
    pub section: Section,
}

// -- Queries --

/// The four editable text fields shared by the add and detail forms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryForm {
    pub email: String,
    pub mobile: String,
    pub heading: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct NewQueryRequest {
    #[serde(flatten)]
    pub form: QueryForm,
    /// Base64-encoded PNG or JPEG screenshot.
    #[serde(default)]
    pub attachment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQueryRequest {
    #[serde(flatten)]
    pub form: QueryForm,
    pub status: QueryStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub status: Option<QueryStatus>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryListResponse {
    pub queries: Vec<QuerySummary>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub can_create: bool,
    pub can_edit: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryDetailResponse {
    pub id: i64,
    pub email: String,
    pub mobile: String,
    pub heading: String,
    pub description: String,
    pub status: QueryStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Base64-encoded screenshot, if one was uploaded.
    pub attachment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewResponse {
    pub view: View,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedQueryResponse {
    pub id: i64,
    pub view: View,
}

// -- Dashboard --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub mean_days: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingCount {
    pub heading: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusShare {
    pub status: QueryStatus,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub resolution_trend: Vec<TrendPoint>,
    pub heading_frequency: Vec<HeadingCount>,
    pub status_distribution: Vec<StatusShare>,
}
