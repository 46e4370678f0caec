use rusqlite::Connection;

use crate::error::Result;

/// Initialise the sessions, chat_messages, and pending_results tables.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            id               TEXT PRIMARY KEY,
            name             TEXT NOT NULL,
            created_at       TEXT NOT NULL,
            last_message_at  TEXT,
            preview          TEXT
        );

        CREATE TABLE IF NOT EXISTS chat_messages (
            id          TEXT PRIMARY KEY,
            session_id  TEXT NOT NULL REFERENCES sessions(id),
            role        TEXT NOT NULL,
            agent_name  TEXT,
            content     TEXT NOT NULL,
            timestamp   TEXT NOT NULL,
            metadata    TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_chat_messages_session
            ON chat_messages(session_id, timestamp, id);

        CREATE TABLE IF NOT EXISTS pending_results (
            id          TEXT PRIMARY KEY,
            origin      TEXT NOT NULL,
            session_id  TEXT NOT NULL REFERENCES sessions(id),
            prompt      TEXT NOT NULL,
            response    TEXT,
            delivered   INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pending_results_session
            ON pending_results(session_id, delivered, created_at);

        CREATE TABLE IF NOT EXISTS tasks (
            id          TEXT PRIMARY KEY,
            session_id  TEXT REFERENCES sessions(id),
            title       TEXT NOT NULL,
            notes       TEXT,
            done        INTEGER NOT NULL DEFAULT 0,
            due_at      TEXT,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_session
            ON tasks(session_id, done, created_at);",
    )?;
    Ok(())
}
