use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    db::init_db,
    error::{Result, SchedulerError},
    schedule::compute_next_run,
    types::ScheduledTask,
};

/// Default bound on tasks fired concurrently by a single engine tick.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

/// Shared handle for task CRUD while the engine loop runs elsewhere.
///
/// Uses its own `Connection` so HTTP handlers can manage tasks without
/// contending with the engine's polling queries.
pub struct SchedulerHandle {
    conn: Arc<Mutex<Connection>>,
}

impl SchedulerHandle {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn create_task(
        &self,
        name: &str,
        cron_expression: &str,
        prompt: &str,
        timezone: &str,
        session_id: Option<&str>,
    ) -> Result<ScheduledTask> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let next_run_at = compute_next_run(cron_expression, timezone, now)?.map(|dt| dt.to_rfc3339());
        let id = Uuid::new_v4().to_string();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO scheduled_tasks
             (id, name, cron_expression, prompt, enabled, timezone, last_run_at,
              next_run_at, run_count, session_id, created_at, updated_at)
             VALUES (?1,?2,?3,?4,1,?5,NULL,?6,0,?7,?8,?8)",
            rusqlite::params![id, name, cron_expression, prompt, timezone, next_run_at, session_id, now_str],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation => {
                SchedulerError::DuplicateName { name: name.to_string() }
            }
            other => SchedulerError::Database(other),
        })?;

        info!(task_id = %id, %name, "scheduled task created");
        Ok(ScheduledTask {
            id,
            name: name.to_string(),
            cron_expression: cron_expression.to_string(),
            prompt: prompt.to_string(),
            enabled: true,
            timezone: timezone.to_string(),
            last_run_at: None,
            run_count: 0,
            session_id: session_id.map(|s| s.to_string()),
            created_at: now_str.clone(),
            updated_at: now_str,
        })
    }

    pub fn delete_task(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM scheduled_tasks WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(SchedulerError::TaskNotFound { id: id.to_string() });
        }
        info!(task_id = %id, "scheduled task deleted");
        Ok(())
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE scheduled_tasks SET enabled = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![enabled, Utc::now().to_rfc3339(), id],
        )?;
        if n == 0 {
            return Err(SchedulerError::TaskNotFound { id: id.to_string() });
        }
        Ok(())
    }

    pub fn list_tasks(&self) -> Result<Vec<ScheduledTask>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, cron_expression, prompt, enabled, timezone,
                    last_run_at, run_count, session_id, created_at, updated_at
             FROM scheduled_tasks ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], row_to_task)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(SchedulerError::Database)
    }
}

/// Core scheduler: persists tasks to SQLite and drives firing at ~1s precision.
pub struct SchedulerEngine {
    conn: Connection,
    /// Fired tasks are sent here for submission to the orchestrator. The
    /// send is awaited while holding a semaphore permit, which is how
    /// `max_concurrent_jobs` bounds parallel firing.
    fired_tx: mpsc::Sender<ScheduledTask>,
    semaphore: Arc<Semaphore>,
}

impl SchedulerEngine {
    /// Create a new engine, initialising the DB schema if needed.
    pub fn new(conn: Connection, fired_tx: mpsc::Sender<ScheduledTask>, max_concurrent_jobs: usize) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn,
            fired_tx,
            semaphore: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        })
    }

    /// Main event loop. Polls every second until `shutdown` broadcasts `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler engine started");
        self.mark_missed_on_startup();

        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("scheduler tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// On startup, recompute `next_run_at` for every enabled task whose
    /// scheduled time has already passed while the process was down —
    /// at-least-once firing means these are picked up by the next tick
    /// rather than silently skipped.
    fn mark_missed_on_startup(&mut self) {
        let now_str = Utc::now().to_rfc3339();
        let overdue_ids: Vec<String> = {
            let mut stmt = match self.conn.prepare(
                "SELECT id FROM scheduled_tasks
                 WHERE enabled = 1 AND next_run_at IS NOT NULL AND next_run_at < ?1",
            ) {
                Ok(s) => s,
                Err(e) => {
                    error!("missed-on-startup query failed: {e}");
                    return;
                }
            };
            match stmt.query_map([&now_str], |row| row.get::<_, String>(0)) {
                Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
                Err(e) => {
                    error!("missed-on-startup query failed: {e}");
                    return;
                }
            }
        };
        if overdue_ids.is_empty() {
            return;
        }
        warn!(count = overdue_ids.len(), "tasks overdue at startup; due on next tick");
        for id in &overdue_ids {
            if let Err(e) = self.conn.execute(
                "UPDATE scheduled_tasks SET next_run_at = ?1 WHERE id = ?2",
                rusqlite::params![now_str, id],
            ) {
                error!(task_id = %id, "failed to fast-forward overdue task: {e}");
            }
        }
    }

    /// Fire every task whose `next_run_at` has arrived.
    async fn tick(&mut self) -> Result<()> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let due: Vec<ScheduledTask> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT id, name, cron_expression, prompt, enabled, timezone,
                        last_run_at, run_count, session_id, created_at, updated_at
                 FROM scheduled_tasks
                 WHERE enabled = 1 AND next_run_at IS NOT NULL AND next_run_at <= ?1",
            )?;
            let rows = stmt.query_map([&now_str], row_to_task)?;
            rows.filter_map(|r| r.ok()).collect()
        };

        for mut task in due {
            let next_run_at = match compute_next_run(&task.cron_expression, &task.timezone, now) {
                Ok(next) => next.map(|dt| dt.to_rfc3339()),
                Err(e) => {
                    error!(task_id = %task.id, "failed to compute next run: {e}");
                    continue;
                }
            };
            let new_run_count = task.run_count + 1;

            self.conn.execute(
                "UPDATE scheduled_tasks
                 SET last_run_at = ?1, next_run_at = ?2, run_count = ?3, updated_at = ?1
                 WHERE id = ?4",
                rusqlite::params![now_str, next_run_at, new_run_count, task.id],
            )?;

            task.last_run_at = Some(now_str.clone());
            task.run_count = new_run_count;
            task.updated_at = now_str.clone();

            info!(task_id = %task.id, name = %task.name, run = new_run_count, "scheduled task fired");

            let tx = self.fired_tx.clone();
            let semaphore = self.semaphore.clone();
            tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return,
                };
                if tx.send(task).await.is_err() {
                    warn!("scheduled task fired but delivery channel is closed");
                }
            });
        }
        Ok(())
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduledTask> {
    Ok(ScheduledTask {
        id: row.get(0)?,
        name: row.get(1)?,
        cron_expression: row.get(2)?,
        prompt: row.get(3)?,
        enabled: row.get(4)?,
        timezone: row.get(5)?,
        last_run_at: row.get(6)?,
        run_count: row.get(7)?,
        session_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> SchedulerHandle {
        let conn = Connection::open_in_memory().unwrap();
        SchedulerHandle::new(conn).unwrap()
    }

    #[test]
    fn create_rejects_duplicate_names() {
        let h = handle();
        h.create_task("daily-brief", "0 9 * * *", "give me the morning brief", "UTC", None).unwrap();
        let err = h.create_task("daily-brief", "0 10 * * *", "again", "UTC", None).unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateName { .. }));
    }

    #[test]
    fn list_tasks_returns_created_task() {
        let h = handle();
        h.create_task("daily-brief", "0 9 * * *", "give me the morning brief", "UTC", Some("s-1")).unwrap();
        let tasks = h.list_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].session_id.as_deref(), Some("s-1"));
        assert!(tasks[0].enabled);
    }

    #[test]
    fn set_enabled_toggles_flag() {
        let h = handle();
        let task = h.create_task("daily-brief", "0 9 * * *", "brief", "UTC", None).unwrap();
        h.set_enabled(&task.id, false).unwrap();
        let tasks = h.list_tasks().unwrap();
        assert!(!tasks[0].enabled);
    }

    #[tokio::test]
    async fn engine_fires_due_task_onto_channel() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO scheduled_tasks
             (id, name, cron_expression, prompt, enabled, timezone, last_run_at,
              next_run_at, run_count, session_id, created_at, updated_at)
             VALUES ('t1','due-now','* * * * *','ping',1,'UTC',NULL,?1,0,NULL,?1,?1)",
            rusqlite::params![now.to_rfc3339()],
        )
        .unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let mut engine = SchedulerEngine::new(conn, tx, 2).unwrap();
        engine.tick().await.unwrap();

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.id, "t1");
        assert_eq!(fired.run_count, 1);
    }
}
