use thiserror::Error;

/// Errors surfaced while stitching a conversation turn, scheduled task, or
/// trigger execution through to the CLI agent and back out a channel.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("tenant not found: {0}")]
    UnknownTenant(String),

    #[error("no channel transport registered for {0}")]
    UnknownChannel(String),

    #[error("malformed CLI wire frame: {0}")]
    Protocol(String),

    #[error("agent reported an error: {0}")]
    AgentReported(String),

    #[error(transparent)]
    Session(#[from] agentfleet_sessions::SessionError),

    #[error(transparent)]
    Cli(#[from] agentfleet_cli::CliError),

    #[error(transparent)]
    Tenant(#[from] agentfleet_tenants::TenantError),

    #[error(transparent)]
    Channel(#[from] agentfleet_channels::ChannelError),
}

impl AgentError {
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::UnknownTenant(_) => "STORAGE_ERROR",
            AgentError::UnknownChannel(_) => "TRANSPORT_ERROR",
            AgentError::Protocol(_) => "AGENT_ERROR",
            AgentError::AgentReported(_) => "AGENT_ERROR",
            AgentError::Session(e) => e.code(),
            AgentError::Cli(e) => e.code(),
            AgentError::Tenant(e) => e.code(),
            AgentError::Channel(e) => e.code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
