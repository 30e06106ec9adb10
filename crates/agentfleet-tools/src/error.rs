use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found in tenant manifest: {name}")]
    NotFound { name: String },

    #[error("failed to spawn tool process: {0}")]
    SpawnFailed(String),

    #[error("tool output exceeded the size cap")]
    OutputTooLarge,

    #[error("tool runtime is at its concurrency cap")]
    Overloaded,

    #[error("tool exited with code {code}: {stderr_tail}")]
    ToolExit { code: i32, stderr_tail: String },

    #[error("tool execution timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::NotFound { .. } => "TOOL_ERROR",
            ToolError::SpawnFailed(_) => "TOOL_ERROR",
            ToolError::OutputTooLarge => "TOOL_ERROR",
            ToolError::Overloaded => "TOOL_ERROR",
            ToolError::ToolExit { .. } => "TOOL_ERROR",
            ToolError::Timeout { .. } => "TOOL_ERROR",
            ToolError::Manifest(_) => "CONFIG_ERROR",
            ToolError::Io(_) => "STORAGE_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ToolError>;
