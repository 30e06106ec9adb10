use thiserror::Error;

/// Errors that can occur during conversation session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested session does not exist in the database.
    #[error("session not found: {key}")]
    NotFound { key: String },

    /// The session is currently leased by another process and the lease
    /// has not yet expired.
    #[error("session {key} is leased by {holder} until {expires_at}")]
    Unavailable {
        key: String,
        holder: String,
        expires_at: String,
    },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::NotFound { .. } => "STORAGE_ERROR",
            SessionError::Unavailable { .. } => "LEASE_ERROR",
            SessionError::Database(_) => "STORAGE_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
