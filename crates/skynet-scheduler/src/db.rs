use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// Creates the `scheduled_tasks` table (idempotent) and an index on
/// `next_run_at` so the polling query is efficient even with thousands of
/// tasks.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS scheduled_tasks (
            id              TEXT    NOT NULL PRIMARY KEY,
            name            TEXT    NOT NULL UNIQUE,
            cron_expression TEXT    NOT NULL,
            prompt          TEXT    NOT NULL,
            enabled         INTEGER NOT NULL DEFAULT 1,
            timezone        TEXT    NOT NULL DEFAULT 'UTC',
            last_run_at     TEXT,
            next_run_at     TEXT,
            run_count       INTEGER NOT NULL DEFAULT 0,
            session_id      TEXT,
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_scheduled_tasks_next_run
            ON scheduled_tasks (next_run_at);
        ",
    )?;
    Ok(())
}
