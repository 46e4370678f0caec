use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The cron expression or timezone name does not parse.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// No task with the given id (or name) exists in the store.
    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    /// A task name collided with an existing one.
    #[error("task name already exists: {name}")]
    DuplicateName { name: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
