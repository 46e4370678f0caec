use serde::{Deserialize, Serialize};

/// A cron-triggered prompt fired into the Agent Orchestration Runtime.
/// `(name)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// UUIDv4 primary key.
    pub id: String,
    /// Unique human-readable label.
    pub name: String,
    /// Standard 5-field cron expression (minute hour day-of-month month day-of-week).
    pub cron_expression: String,
    /// The prompt handed to the root agent when this task fires.
    pub prompt: String,
    pub enabled: bool,
    /// IANA timezone name the cron expression is evaluated in (e.g. `"America/Denver"`).
    pub timezone: String,
    /// RFC3339 timestamp of the most recent fire, if any.
    pub last_run_at: Option<String>,
    pub run_count: u32,
    /// Target session for result broadcast; `None` routes to a default session.
    pub session_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
