use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    #[error("failed to acquire scheduler advisory lock")]
    LockUnavailable,
}

impl SchedulerError {
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::Database(_) => "STORAGE_ERROR",
            SchedulerError::InvalidSchedule(_) => "CONFIG_ERROR",
            SchedulerError::TaskNotFound { .. } => "STORAGE_ERROR",
            SchedulerError::LockUnavailable => "LEASE_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
