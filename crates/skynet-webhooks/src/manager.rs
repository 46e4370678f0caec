use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{Result, WebhookError};
use crate::types::WebhookDefinition;

/// Thread-safe manager for registered webhook endpoints.
pub struct WebhookStore {
    db: Mutex<Connection>,
}

impl WebhookStore {
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    #[instrument(skip(self, prompt_template, secret), fields(name, path_suffix))]
    pub fn create(
        &self,
        name: &str,
        path_suffix: &str,
        prompt_template: &str,
        secret: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<WebhookDefinition> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO webhook_definitions
             (id, name, path_suffix, prompt_template, secret, enabled,
              trigger_count, last_triggered_at, session_id, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,1,0,NULL,?6,?7,?7)",
            rusqlite::params![id, name, path_suffix, prompt_template, secret, session_id, now],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, ref msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation
                    && msg.as_ref().is_some_and(|m| m.contains("path_suffix")) =>
            {
                WebhookError::DuplicatePathSuffix { path_suffix: path_suffix.to_string() }
            }
            other => WebhookError::Database(other),
        })?;

        info!(webhook_id = %id, %name, "webhook definition created");
        Ok(WebhookDefinition {
            id,
            name: name.to_string(),
            path_suffix: path_suffix.to_string(),
            prompt_template: prompt_template.to_string(),
            secret: secret.map(|s| s.to_string()),
            enabled: true,
            trigger_count: 0,
            last_triggered_at: None,
            session_id: session_id.map(|s| s.to_string()),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn get_by_path_suffix(&self, path_suffix: &str) -> Result<Option<WebhookDefinition>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT id, name, path_suffix, prompt_template, secret, enabled,
                    trigger_count, last_triggered_at, session_id, created_at, updated_at
             FROM webhook_definitions WHERE path_suffix = ?1",
            rusqlite::params![path_suffix],
            row_to_definition,
        ) {
            Ok(d) => Ok(Some(d)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(WebhookError::Database(e)),
        }
    }

    pub fn list(&self) -> Result<Vec<WebhookDefinition>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, name, path_suffix, prompt_template, secret, enabled,
                    trigger_count, last_triggered_at, session_id, created_at, updated_at
             FROM webhook_definitions ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], row_to_definition)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(WebhookError::Database)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM webhook_definitions WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(WebhookError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE webhook_definitions SET enabled = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![enabled, chrono::Utc::now().to_rfc3339(), id],
        )?;
        if n == 0 {
            return Err(WebhookError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Increment `trigger_count` and stamp `last_triggered_at`. Called only
    /// after a successful (2xx) dispatch into the orchestrator — never on a
    /// rejected (401/413) request.
    pub fn record_trigger(&self, id: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE webhook_definitions
             SET trigger_count = trigger_count + 1, last_triggered_at = ?1
             WHERE id = ?2",
            rusqlite::params![now, id],
        )?;
        if n == 0 {
            return Err(WebhookError::NotFound { id: id.to_string() });
        }
        Ok(())
    }
}

fn row_to_definition(row: &rusqlite::Row<'_>) -> rusqlite::Result<WebhookDefinition> {
    Ok(WebhookDefinition {
        id: row.get(0)?,
        name: row.get(1)?,
        path_suffix: row.get(2)?,
        prompt_template: row.get(3)?,
        secret: row.get(4)?,
        enabled: row.get(5)?,
        trigger_count: row.get::<_, i64>(6)? as u64,
        last_triggered_at: row.get(7)?,
        session_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> WebhookStore {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        WebhookStore::new(conn)
    }

    #[test]
    fn create_rejects_duplicate_path_suffix() {
        let store = store();
        store.create("calendar", "cal", "{{payload.event}}", None, None).unwrap();
        let err = store.create("calendar-2", "cal", "{{payload.event}}", None, None).unwrap_err();
        assert!(matches!(err, WebhookError::DuplicatePathSuffix { .. }));
    }

    #[test]
    fn record_trigger_increments_count_and_stamps_time() {
        let store = store();
        let def = store.create("calendar", "cal", "{{payload.event}}", None, None).unwrap();
        store.record_trigger(&def.id).unwrap();
        let fetched = store.get_by_path_suffix("cal").unwrap().unwrap();
        assert_eq!(fetched.trigger_count, 1);
        assert!(fetched.last_triggered_at.is_some());
    }

    #[test]
    fn get_by_path_suffix_returns_none_when_absent() {
        let store = store();
        assert!(store.get_by_path_suffix("nope").unwrap().is_none());
    }
}
