use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ffi};
use tracing::warn;

use cqms_types::api::QueryForm;
use cqms_types::models::{Query, QueryRecord, QueryStatus, QuerySummary, Role, User};

use crate::Database;
use crate::models::{QueryRow, QuerySummaryRow, StatusUpdate, UserRow, format_timestamp};

impl Database {
    // -- Users --

    pub fn user_exists(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM users WHERE username = ?1", [username], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Looks up a user by username and checks the password against the
    /// stored digest. Unknown usernames and wrong passwords are
    /// indistinguishable to the caller.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, username, roles, hashed_password FROM users WHERE username = ?1",
                    [username],
                    |row| Ok((read_user_row(row)?, row.get::<_, String>(3)?)),
                )
                .optional()?;
            row.filter(|(_, stored)| cqms_crypto::verify_password(password, stored))
                .map(|(user, _)| User::try_from(user))
                .transpose()
        })
    }

    /// Inserts a user. Returns `None` when the username is already taken,
    /// including when a concurrent registration won the race past
    /// [`Database::user_exists`].
    pub fn register_user(
        &self,
        username: &str,
        password_digest: &str,
        role: Role,
    ) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (username, hashed_password, roles) VALUES (?1, ?2, ?3)",
                (username, password_digest, role.as_str()),
            );
            match inserted {
                Ok(_) => Ok(Some(conn.last_insert_rowid())),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    warn!("Registration of '{}' hit a uniqueness constraint", username);
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row("SELECT id, username, roles FROM users WHERE id = ?1", [id], read_user_row)
                .optional()?;
            row.map(User::try_from).transpose()
        })
    }

    // -- Queries --

    /// Lists query summaries, newest query id first. `owner` restricts the
    /// result to one user's queries; `None` lists everything.
    pub fn list_queries(&self, owner: Option<i64>) -> Result<Vec<QuerySummary>> {
        self.with_conn(|conn| query_summaries(conn, owner))
    }

    /// Same filter as [`Database::list_queries`], with timestamps and
    /// without attachments. Newest creation time first.
    pub fn list_query_records(&self, owner: Option<i64>) -> Result<Vec<QueryRecord>> {
        self.with_conn(|conn| query_records(conn, owner))
    }

    pub fn get_query(&self, id: i64) -> Result<Option<Query>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT query_id, user_id, emailid, mobilenumber, query_heading, query_description,
                            query_created_time, status, query_closed_time, screenshot
                     FROM client_query_details WHERE query_id = ?1",
                    [id],
                    read_query_row,
                )
                .optional()?;
            row.map(Query::try_from).transpose()
        })
    }

    /// Creates a query owned by `owner_user_id`. Status is always Open and
    /// the closed timestamp always empty.
    pub fn insert_query(
        &self,
        owner_user_id: i64,
        form: &QueryForm,
        attachment: Option<&[u8]>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO client_query_details
                    (user_id, emailid, mobilenumber, query_heading, query_description,
                     query_created_time, status, query_closed_time, screenshot)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)",
                rusqlite::params![
                    owner_user_id,
                    form.email,
                    form.mobile,
                    form.heading,
                    form.description,
                    format_timestamp(now),
                    QueryStatus::Open.as_str(),
                    attachment,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Overwrites the editable fields and status of a query.
    ///
    /// The closed timestamp is stamped with `now` only on an Open -> Closed
    /// transition; re-closing keeps the first value. Reopening is rejected.
    pub fn update_query(
        &self,
        id: i64,
        form: &QueryForm,
        status: QueryStatus,
        now: DateTime<Utc>,
    ) -> Result<StatusUpdate> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let current: Option<String> = tx
                .query_row(
                    "SELECT status FROM client_query_details WHERE query_id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(current) = current else {
                return Ok(StatusUpdate::NotFound);
            };
            let current: QueryStatus = current
                .parse()
                .map_err(|e| anyhow::anyhow!("Corrupt status on query {}: {}", id, e))?;

            if current == QueryStatus::Closed && status == QueryStatus::Open {
                return Ok(StatusUpdate::Rejected {
                    from: current,
                    to: status,
                });
            }

            tx.execute(
                "UPDATE client_query_details
                 SET emailid = ?1, mobilenumber = ?2, query_heading = ?3, query_description = ?4,
                     status = ?5,
                     query_closed_time = CASE
                         WHEN status = 'Open' AND ?5 = 'Closed' THEN ?6
                         ELSE query_closed_time
                     END
                 WHERE query_id = ?7",
                rusqlite::params![
                    form.email,
                    form.mobile,
                    form.heading,
                    form.description,
                    status.as_str(),
                    format_timestamp(now),
                    id,
                ],
            )?;
            tx.commit()?;

            Ok(StatusUpdate::Updated)
        })
    }
}

fn read_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        roles: row.get(2)?,
    })
}

fn read_query_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueryRow> {
    Ok(QueryRow {
        query_id: row.get(0)?,
        user_id: row.get(1)?,
        emailid: row.get(2)?,
        mobilenumber: row.get(3)?,
        query_heading: row.get(4)?,
        query_description: row.get(5)?,
        query_created_time: row.get(6)?,
        status: row.get(7)?,
        query_closed_time: row.get(8)?,
        screenshot: row.get(9)?,
    })
}

fn query_summaries(conn: &Connection, owner: Option<i64>) -> Result<Vec<QuerySummary>> {
    let mut sql = String::from(
        "SELECT query_id, emailid, mobilenumber, query_heading, query_description, status
         FROM client_query_details",
    );
    if owner.is_some() {
        sql.push_str(" WHERE user_id = ?1");
    }
    sql.push_str(" ORDER BY query_id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<QuerySummaryRow> {
        Ok(QuerySummaryRow {
            query_id: row.get(0)?,
            emailid: row.get(1)?,
            mobilenumber: row.get(2)?,
            query_heading: row.get(3)?,
            query_description: row.get(4)?,
            status: row.get(5)?,
        })
    };

    let rows = if let Some(owner) = owner {
        stmt.query_map([owner], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?
    } else {
        stmt.query_map([], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    rows.into_iter().map(QuerySummary::try_from).collect()
}

fn query_records(conn: &Connection, owner: Option<i64>) -> Result<Vec<QueryRecord>> {
    let mut sql = String::from(
        "SELECT query_id, user_id, emailid, mobilenumber, query_heading, query_description,
                query_created_time, status, query_closed_time, NULL
         FROM client_query_details",
    );
    if owner.is_some() {
        sql.push_str(" WHERE user_id = ?1");
    }
    sql.push_str(" ORDER BY query_created_time DESC, query_id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = if let Some(owner) = owner {
        stmt.query_map([owner], read_query_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?
    } else {
        stmt.query_map([], read_query_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    rows.into_iter()
        .map(|row| Query::try_from(row).map(|q| q.record))
        .collect()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
