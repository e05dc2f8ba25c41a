use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two account roles. Stored verbatim in `users.roles`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Client,
    Support,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "Client",
            Self::Support => "Support",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Client" => Ok(Self::Client),
            "Support" => Ok(Self::Support),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Query lifecycle status. Only `Open -> Closed` is a legal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QueryStatus {
    Open,
    Closed,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Closed => "Closed",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(Self::Open),
            "Closed" => Ok(Self::Closed),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// An authenticated identity. Never carries the password digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

/// One row of the query list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySummary {
    pub id: i64,
    pub email: String,
    pub mobile: String,
    pub heading: String,
    pub description: String,
    pub status: QueryStatus,
}

impl QuerySummary {
    /// String form of every column, in display order. Used by free-text search.
    pub fn columns(&self) -> [String; 6] {
        [
            self.id.to_string(),
            self.email.clone(),
            self.mobile.clone(),
            self.heading.clone(),
            self.description.clone(),
            self.status.to_string(),
        ]
    }
}

/// A query with its timestamps, as fed to the dashboard aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: i64,
    pub owner_user_id: i64,
    pub email: String,
    pub mobile: String,
    pub heading: String,
    pub description: String,
    pub status: QueryStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Full query record including the optional screenshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub record: QueryRecord,
    pub attachment: Option<Vec<u8>>,
}

/// Sidebar sections available once logged in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    #[default]
    Dashboard,
    Queries,
}

/// The screen a session is currently looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "screen", content = "query_id", rename_all = "snake_case")]
pub enum Screen {
    Login,
    Registration,
    Dashboard,
    QueryList,
    QueryDetail(i64),
    AddQuery,
}

/// Position within the query lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "query_id", rename_all = "snake_case")]
pub enum View {
    Listing,
    Detail(i64),
    Creating,
}
