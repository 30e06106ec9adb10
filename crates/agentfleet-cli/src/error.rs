use thiserror::Error;

/// Errors that can occur while managing a persistent CLI agent session.
#[derive(Debug, Error)]
pub enum CliError {
    /// Spawning the child process failed.
    #[error("failed to spawn CLI process: {0}")]
    SpawnFailed(String),

    /// No session exists for the requested key.
    #[error("CLI session not found: {0}")]
    NotFound(String),

    /// The session's child process has already exited.
    #[error("CLI session is closed: {0}")]
    Closed(String),

    /// Waiting for a response from the child process exceeded its budget.
    #[error("CLI session timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Underlying I/O failure writing to or reading from the child.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line written by the child could not be parsed as JSON.
    #[error("malformed CLI frame: {0}")]
    MalformedFrame(String),
}

impl CliError {
    pub fn code(&self) -> &'static str {
        match self {
            CliError::SpawnFailed(_) => "AGENT_ERROR",
            CliError::NotFound(_) => "AGENT_ERROR",
            CliError::Closed(_) => "AGENT_ERROR",
            CliError::Timeout { .. } => "AGENT_ERROR",
            CliError::Io(_) => "AGENT_ERROR",
            CliError::MalformedFrame(_) => "AGENT_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
