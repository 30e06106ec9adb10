use thiserror::Error;

/// Error taxonomy shared across every agentfleet crate. Each crate that needs
/// its own error enum wraps or maps into one of these seven categories so
/// that `.code()` is stable across the whole system.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("lease error: {0}")]
    Lease(String),

    #[error("agent error: {0}")]
    Agent(String),

    #[error("tool error: {0}")]
    Tool(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable short code. Propagated up to HTTP responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
            CoreError::Transport(_) => "TRANSPORT_ERROR",
            CoreError::Auth(_) => "AUTH_ERROR",
            CoreError::Lease(_) => "LEASE_ERROR",
            CoreError::Agent(_) => "AGENT_ERROR",
            CoreError::Tool(_) => "TOOL_ERROR",
            CoreError::Storage(_) => "STORAGE_ERROR",
            CoreError::Serialization(_) => "STORAGE_ERROR",
            CoreError::Io(_) => "STORAGE_ERROR",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
