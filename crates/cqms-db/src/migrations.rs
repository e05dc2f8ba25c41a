use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, client_query_details)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                hashed_password TEXT NOT NULL,
                roles           TEXT NOT NULL CHECK (roles IN ('Client', 'Support'))
            );

            CREATE TABLE client_query_details (
                query_id            INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id             INTEGER NOT NULL REFERENCES users(id),
                emailid             TEXT NOT NULL,
                mobilenumber        TEXT NOT NULL,
                query_heading       TEXT NOT NULL,
                query_description   TEXT NOT NULL,
                query_created_time  TEXT NOT NULL DEFAULT (datetime('now')),
                status              TEXT NOT NULL DEFAULT 'Open' CHECK (status IN ('Open', 'Closed')),
                query_closed_time   TEXT,
                screenshot          BLOB
            );

            CREATE INDEX idx_queries_user
                ON client_query_details(user_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
