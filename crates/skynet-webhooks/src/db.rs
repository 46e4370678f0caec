use rusqlite::Connection;

use crate::error::Result;

/// Initialise the webhook_definitions table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS webhook_definitions (
            id                TEXT    NOT NULL PRIMARY KEY,
            name              TEXT    NOT NULL UNIQUE,
            path_suffix       TEXT    NOT NULL UNIQUE,
            prompt_template   TEXT    NOT NULL,
            secret            TEXT,
            enabled           INTEGER NOT NULL DEFAULT 1,
            trigger_count     INTEGER NOT NULL DEFAULT 0,
            last_triggered_at TEXT,
            session_id        TEXT,
            created_at        TEXT    NOT NULL,
            updated_at        TEXT    NOT NULL
        ) STRICT;",
    )?;
    Ok(())
}
