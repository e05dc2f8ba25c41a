//! Database row types. These map directly to SQLite rows.
//! Conversion into `cqms-types` models happens here so callers never see
//! raw column strings.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};

use cqms_types::models::{Query, QueryRecord, QueryStatus, QuerySummary, Role, User};

/// Format used for every timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub roles: String,
}

pub struct QuerySummaryRow {
    pub query_id: i64,
    pub emailid: String,
    pub mobilenumber: String,
    pub query_heading: String,
    pub query_description: String,
    pub status: String,
}

pub struct QueryRow {
    pub query_id: i64,
    pub user_id: i64,
    pub emailid: String,
    pub mobilenumber: String,
    pub query_heading: String,
    pub query_description: String,
    pub query_created_time: String,
    pub status: String,
    pub query_closed_time: Option<String>,
    pub screenshot: Option<Vec<u8>>,
}

/// Result of a status update against the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    Updated,
    NotFound,
    /// The requested status change is not allowed (Closed -> Open).
    Rejected { from: QueryStatus, to: QueryStatus },
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        let role = row
            .roles
            .parse::<Role>()
            .map_err(|e| anyhow!("Corrupt role on user {}: {}", row.id, e))?;
        Ok(User {
            id: row.id,
            username: row.username,
            role,
        })
    }
}

impl TryFrom<QuerySummaryRow> for QuerySummary {
    type Error = anyhow::Error;

    fn try_from(row: QuerySummaryRow) -> Result<Self> {
        Ok(QuerySummary {
            id: row.query_id,
            status: parse_status(row.query_id, &row.status)?,
            email: row.emailid,
            mobile: row.mobilenumber,
            heading: row.query_heading,
            description: row.query_description,
        })
    }
}

impl TryFrom<QueryRow> for Query {
    type Error = anyhow::Error;

    fn try_from(row: QueryRow) -> Result<Self> {
        let record = QueryRecord {
            id: row.query_id,
            owner_user_id: row.user_id,
            status: parse_status(row.query_id, &row.status)?,
            created_at: parse_timestamp(&row.query_created_time)?,
            closed_at: row.query_closed_time.as_deref().map(parse_timestamp).transpose()?,
            email: row.emailid,
            mobile: row.mobilenumber,
            heading: row.query_heading,
            description: row.query_description,
        };
        Ok(Query {
            record,
            attachment: row.screenshot,
        })
    }
}

fn parse_status(query_id: i64, raw: &str) -> Result<QueryStatus> {
    raw.parse::<QueryStatus>()
        .map_err(|e| anyhow!("Corrupt status on query {}: {}", query_id, e))
}

/// Parses RFC 3339 or SQLite's `YYYY-MM-DD HH:MM:SS` (naive UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map(|ndt| ndt.and_utc()))
        .map_err(|e| anyhow!("Corrupt timestamp '{}': {}", raw, e))
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}
