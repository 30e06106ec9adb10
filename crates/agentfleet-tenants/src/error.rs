use thiserror::Error;

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("Tenant not found: {0}")]
    NotFound(String),

    #[error("Tenant already exists: {0}")]
    AlreadyExists(String),

    #[error("Credential not found: tenant={tenant_id} service={service_name}")]
    CredentialNotFound { tenant_id: String, service_name: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Credentials encryption key is not configured")]
    MissingEncryptionKey,

    #[error("Credential crypto error: {0}")]
    Crypto(String),

    #[error("Filesystem bootstrap error: {0}")]
    Io(#[from] std::io::Error),
}

impl TenantError {
    pub fn code(&self) -> &'static str {
        match self {
            TenantError::NotFound(_) => "STORAGE_ERROR",
            TenantError::AlreadyExists(_) => "STORAGE_ERROR",
            TenantError::CredentialNotFound { .. } => "STORAGE_ERROR",
            TenantError::Database(_) => "STORAGE_ERROR",
            TenantError::MissingEncryptionKey => "CONFIG_ERROR",
            TenantError::Crypto(_) => "CONFIG_ERROR",
            TenantError::Io(_) => "STORAGE_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, TenantError>;
