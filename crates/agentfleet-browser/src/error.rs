use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("browser session not found: {id}")]
    NotFound { id: String },

    #[error("tenant {tenant_id} is at its browser session cap")]
    SessionLimit { tenant_id: String },

    #[error("failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("browser health probe failed: {0}")]
    HealthCheckFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrowserError {
    pub fn code(&self) -> &'static str {
        match self {
            BrowserError::Database(_) => "STORAGE_ERROR",
            BrowserError::NotFound { .. } => "STORAGE_ERROR",
            BrowserError::SessionLimit { .. } => "AGENT_ERROR",
            BrowserError::LaunchFailed(_) => "TOOL_ERROR",
            BrowserError::HealthCheckFailed(_) => "TOOL_ERROR",
            BrowserError::Io(_) => "STORAGE_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, BrowserError>;
