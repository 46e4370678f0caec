//! `skynet-scheduler` — Tokio-based cron scheduler with SQLite persistence.
//!
//! Tasks are persisted to the `scheduled_tasks` table. The
//! [`engine::SchedulerEngine`] polls the database every second, fires any
//! task whose `next_run_at` has arrived into a bounded set of concurrent
//! dispatches (`max_concurrent_jobs`), and hands it off via an mpsc channel
//! for the caller to submit into the Agent Orchestration Runtime.
//!
//! Firing is at-least-once: a restart recomputes `next_run_at` for every
//! task whose scheduled time has already passed rather than silently
//! dropping it, and each fire produces its own downstream `PendingResult`
//! row, so replays are idempotent at the sink.

pub mod db;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use engine::{SchedulerEngine, SchedulerHandle};
pub use error::{Result, SchedulerError};
pub use types::ScheduledTask;
