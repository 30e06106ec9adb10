use thiserror::Error;

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("trigger not found: {id}")]
    NotFound { id: String },

    #[error("trigger adapter error: {0}")]
    Adapter(String),
}

impl TriggerError {
    pub fn code(&self) -> &'static str {
        match self {
            TriggerError::Database(_) => "STORAGE_ERROR",
            TriggerError::NotFound { .. } => "STORAGE_ERROR",
            TriggerError::Adapter(_) => "AGENT_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, TriggerError>;
