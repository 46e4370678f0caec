use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::types::{ChatMessage, ChatRole, PendingResult, Session, Task, TriggerOrigin};

const PREVIEW_MAX_CHARS: usize = 120;

/// Thread-safe manager for persisted sessions, chat messages, and the
/// pending-result inbox fed by the scheduler and webhook receiver.
///
/// Wraps a single SQLite connection in a `Mutex`. For high-concurrency
/// deployments consider a connection pool (e.g. r2d2), but a Mutex is
/// sufficient for a single-process deployment.
pub struct SessionManager {
    db: Mutex<Connection>,
}

impl SessionManager {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    /// Create a new session with the given display name.
    #[instrument(skip(self), fields(name))]
    pub fn create(&self, name: &str) -> Result<Session> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO sessions (id, name, created_at, last_message_at, preview)
             VALUES (?1, ?2, ?3, NULL, NULL)",
            rusqlite::params![id, name, now],
        )?;
        Ok(Session {
            id,
            name: name.to_string(),
            created_at: now,
            last_message_at: None,
            preview: None,
        })
    }

    /// Look up `session_id`, creating it with a default name if absent —
    /// used when a trigger (scheduler/webhook) targets a session that has
    /// not been created through the REST surface yet.
    #[instrument(skip(self), fields(session_id))]
    pub fn get_or_create(&self, session_id: &str, default_name: &str) -> Result<Session> {
        if let Some(session) = self.get(session_id)? {
            return Ok(session);
        }
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR IGNORE INTO sessions (id, name, created_at, last_message_at, preview)
             VALUES (?1, ?2, ?3, NULL, NULL)",
            rusqlite::params![session_id, default_name, now],
        )?;
        drop(db);
        self.get(session_id)?
            .ok_or_else(|| SessionError::NotFound { id: session_id.to_string() })
    }

    #[instrument(skip(self), fields(id))]
    pub fn get(&self, id: &str) -> Result<Option<Session>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT id, name, created_at, last_message_at, preview
             FROM sessions WHERE id = ?1",
            rusqlite::params![id],
            row_to_session,
        ) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SessionError::Database(e)),
        }
    }

    /// List sessions, most recently active first.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<Session>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, name, created_at, last_message_at, preview
             FROM sessions
             ORDER BY COALESCE(last_message_at, created_at) DESC",
        )?;
        let rows = stmt.query_map([], row_to_session)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    #[instrument(skip(self), fields(id, name))]
    pub fn rename(&self, id: &str, name: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE sessions SET name = ?1 WHERE id = ?2",
            rusqlite::params![name, id],
        )?;
        if rows_changed == 0 {
            return Err(SessionError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    #[instrument(skip(self), fields(id))]
    pub fn delete(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute("DELETE FROM sessions WHERE id = ?1", rusqlite::params![id])?;
        if rows_changed == 0 {
            return Err(SessionError::NotFound { id: id.to_string() });
        }
        db.execute("DELETE FROM chat_messages WHERE session_id = ?1", rusqlite::params![id])?;
        db.execute("DELETE FROM pending_results WHERE session_id = ?1", rusqlite::params![id])?;
        Ok(())
    }

    /// Persist a chat message and bump the session's `last_message_at`/
    /// `preview`. Assigns the message its own UUIDv4 and a millisecond-
    /// precision timestamp so `(timestamp, id)` totally orders the log.
    #[instrument(skip(self, content), fields(session_id, role = %role))]
    pub fn append_message(
        &self,
        session_id: &str,
        role: ChatRole,
        agent_name: Option<&str>,
        content: &str,
        metadata: serde_json::Value,
    ) -> Result<ChatMessage> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO chat_messages (id, session_id, role, agent_name, content, timestamp, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![id, session_id, role.to_string(), agent_name, content, now, metadata_json],
        )?;

        let preview: String = content.chars().take(PREVIEW_MAX_CHARS).collect();
        db.execute(
            "UPDATE sessions SET last_message_at = ?1, preview = ?2 WHERE id = ?3",
            rusqlite::params![now, preview, session_id],
        )?;
        debug!("chat message persisted");

        Ok(ChatMessage {
            id,
            session_id: session_id.to_string(),
            role,
            agent_name: agent_name.map(|s| s.to_string()),
            content: content.to_string(),
            timestamp: now,
            metadata,
        })
    }

    /// Messages for `session_id` with `timestamp > since`, ascending order
    /// — serves `sync_request`.
    #[instrument(skip(self), fields(session_id, since))]
    pub fn messages_since(&self, session_id: &str, since: &str) -> Result<Vec<ChatMessage>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, session_id, role, agent_name, content, timestamp, metadata
             FROM chat_messages
             WHERE session_id = ?1 AND timestamp > ?2
             ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![session_id, since], row_to_message)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(SessionError::Database)
    }

    /// Last `limit` messages for `session_id`, ascending order — serves
    /// `history_request` and the REST history endpoint.
    #[instrument(skip(self), fields(session_id, limit))]
    pub fn recent_messages(&self, session_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, session_id, role, agent_name, content, timestamp, metadata
             FROM (
                SELECT * FROM chat_messages
                WHERE session_id = ?1
                ORDER BY timestamp DESC, id DESC
                LIMIT ?2
             )
             ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![session_id, limit as i64], row_to_message)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(SessionError::Database)
    }

    /// Create a `PendingResult` row when a scheduler/webhook trigger fires.
    #[instrument(skip(self, prompt), fields(session_id, origin = %origin))]
    pub fn create_pending(&self, origin: TriggerOrigin, session_id: &str, prompt: &str) -> Result<PendingResult> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO pending_results (id, origin, session_id, prompt, response, delivered, created_at)
             VALUES (?1, ?2, ?3, ?4, NULL, 0, ?5)",
            rusqlite::params![id, origin.to_string(), session_id, prompt, now],
        )?;
        Ok(PendingResult {
            id,
            origin,
            session_id: session_id.to_string(),
            prompt: prompt.to_string(),
            response: None,
            delivered: false,
            created_at: now,
        })
    }

    /// Fill in `response` once the triggered run completes.
    #[instrument(skip(self, response), fields(id))]
    pub fn complete_pending(&self, id: &str, response: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE pending_results SET response = ?1 WHERE id = ?2",
            rusqlite::params![response, id],
        )?;
        if rows_changed == 0 {
            return Err(SessionError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Mark every undelivered, completed pending result for `session_id` as
    /// delivered — called once a WebSocket client has replayed them.
    #[instrument(skip(self), fields(session_id))]
    pub fn mark_delivered(&self, session_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE pending_results SET delivered = 1
             WHERE session_id = ?1 AND delivered = 0 AND response IS NOT NULL",
            rusqlite::params![session_id],
        )?;
        Ok(())
    }

    /// Undelivered, completed pending results for `session_id`, oldest
    /// first — replayed to a reconnecting client.
    #[instrument(skip(self), fields(session_id))]
    pub fn undelivered(&self, session_id: &str) -> Result<Vec<PendingResult>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, origin, session_id, prompt, response, delivered, created_at
             FROM pending_results
             WHERE session_id = ?1 AND delivered = 0 AND response IS NOT NULL
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![session_id], row_to_pending)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(SessionError::Database)
    }

    /// Create a todo/reminder item, optionally tied to a session.
    #[instrument(skip(self, title, notes), fields(session_id))]
    pub fn create_task(
        &self,
        session_id: Option<&str>,
        title: &str,
        notes: Option<&str>,
        due_at: Option<&str>,
    ) -> Result<Task> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO tasks (id, session_id, title, notes, done, due_at, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
            rusqlite::params![id, session_id, title, notes, due_at, now],
        )?;
        Ok(Task {
            id,
            session_id: session_id.map(|s| s.to_string()),
            title: title.to_string(),
            notes: notes.map(|s| s.to_string()),
            done: false,
            due_at: due_at.map(|s| s.to_string()),
            created_at: now,
        })
    }

    /// List tasks, optionally filtered to a session, open items first.
    #[instrument(skip(self))]
    pub fn list_tasks(&self, session_id: Option<&str>) -> Result<Vec<Task>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, session_id, title, notes, done, due_at, created_at
             FROM tasks
             WHERE ?1 IS NULL OR session_id = ?1
             ORDER BY done ASC, COALESCE(due_at, created_at) ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![session_id], row_to_task)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(SessionError::Database)
    }

    #[instrument(skip(self), fields(id))]
    pub fn set_task_done(&self, id: &str, done: bool) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE tasks SET done = ?1 WHERE id = ?2",
            rusqlite::params![done as i64, id],
        )?;
        if rows_changed == 0 {
            return Err(SessionError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    #[instrument(skip(self), fields(id))]
    pub fn delete_task(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute("DELETE FROM tasks WHERE id = ?1", rusqlite::params![id])?;
        if rows_changed == 0 {
            return Err(SessionError::NotFound { id: id.to_string() });
        }
        Ok(())
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        last_message_at: row.get(3)?,
        preview: row.get(4)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    let role_str: String = row.get(2)?;
    let metadata_str: String = row.get(6)?;
    Ok(ChatMessage {
        id: row.get(0)?,
        session_id: row.get(1)?,
        role: role_str.parse().unwrap_or(ChatRole::System),
        agent_name: row.get(3)?,
        content: row.get(4)?,
        timestamp: row.get(5)?,
        metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::Value::Null),
    })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        session_id: row.get(1)?,
        title: row.get(2)?,
        notes: row.get(3)?,
        done: row.get::<_, i64>(4)? != 0,
        due_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn row_to_pending(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingResult> {
    let origin_str: String = row.get(1)?;
    Ok(PendingResult {
        id: row.get(0)?,
        origin: origin_str.parse().unwrap_or(TriggerOrigin::Scheduler),
        session_id: row.get(2)?,
        prompt: row.get(3)?,
        response: row.get(4)?,
        delivered: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        SessionManager::new(conn)
    }

    #[test]
    fn create_then_get_roundtrips() {
        let mgr = manager();
        let session = mgr.create("Trip planning").unwrap();
        let fetched = mgr.get(&session.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Trip planning");
        assert!(fetched.last_message_at.is_none());
    }

    #[test]
    fn append_message_updates_preview_and_last_message_at() {
        let mgr = manager();
        let session = mgr.create("main").unwrap();
        mgr.append_message(&session.id, ChatRole::User, None, "hello there", serde_json::Value::Null)
            .unwrap();
        let fetched = mgr.get(&session.id).unwrap().unwrap();
        assert_eq!(fetched.preview.as_deref(), Some("hello there"));
        assert!(fetched.last_message_at.is_some());
    }

    #[test]
    fn recent_messages_returns_ascending_order() {
        let mgr = manager();
        let session = mgr.create("main").unwrap();
        mgr.append_message(&session.id, ChatRole::User, None, "one", serde_json::Value::Null).unwrap();
        mgr.append_message(&session.id, ChatRole::Assistant, Some("root"), "two", serde_json::Value::Null).unwrap();

        let messages = mgr.recent_messages(&session.id, 10).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "one");
        assert_eq!(messages[1].content, "two");
    }

    #[test]
    fn pending_result_lifecycle() {
        let mgr = manager();
        let session = mgr.create("main").unwrap();
        let pending = mgr.create_pending(TriggerOrigin::Scheduler, &session.id, "run the morning brief").unwrap();
        assert!(!pending.delivered);

        assert!(mgr.undelivered(&session.id).unwrap().is_empty());

        mgr.complete_pending(&pending.id, "here's your brief").unwrap();
        let undelivered = mgr.undelivered(&session.id).unwrap();
        assert_eq!(undelivered.len(), 1);
        assert_eq!(undelivered[0].response.as_deref(), Some("here's your brief"));

        mgr.mark_delivered(&session.id).unwrap();
        assert!(mgr.undelivered(&session.id).unwrap().is_empty());
    }

    #[test]
    fn delete_missing_session_errors() {
        let mgr = manager();
        assert!(mgr.delete("does-not-exist").is_err());
    }

    #[test]
    fn task_lifecycle() {
        let mgr = manager();
        let task = mgr.create_task(None, "buy milk", None, None).unwrap();
        assert!(!task.done);

        let tasks = mgr.list_tasks(None).unwrap();
        assert_eq!(tasks.len(), 1);

        mgr.set_task_done(&task.id, true).unwrap();
        let tasks = mgr.list_tasks(None).unwrap();
        assert!(tasks[0].done);

        mgr.delete_task(&task.id).unwrap();
        assert!(mgr.list_tasks(None).unwrap().is_empty());
    }

    #[test]
    fn list_tasks_filters_by_session() {
        let mgr = manager();
        let session = mgr.create("main").unwrap();
        mgr.create_task(Some(&session.id), "scoped", None, None).unwrap();
        mgr.create_task(None, "global", None, None).unwrap();

        let scoped = mgr.list_tasks(Some(&session.id)).unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].title, "scoped");
    }
}
