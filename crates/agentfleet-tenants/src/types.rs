use agentfleet_core::ChannelKind;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a tenant. Mutated only by administrative flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    #[default]
    Active,
    Paused,
    Archived,
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenantStatus::Active => write!(f, "active"),
            TenantStatus::Paused => write!(f, "paused"),
            TenantStatus::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for TenantStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(TenantStatus::Active),
            "paused" => Ok(TenantStatus::Paused),
            "archived" => Ok(TenantStatus::Archived),
            other => Err(format!("unknown tenant status: {other}")),
        }
    }
}

/// A single isolated customer: own filesystem root, credentials, sessions,
/// tasks, triggers. `onboarding_phase` is an opaque string produced by the
/// onboarding flow; the core never branches on its content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub display_name: String,
    pub channel: ChannelKind,
    /// Platform-native recipient id on `channel` (phone number, chat id).
    pub recipient_id: String,
    pub status: TenantStatus,
    pub onboarding_phase: String,
    pub created_at: String,
    pub updated_at: String,
}

/// An encrypted `(tenant_id, service_name)` secret. `encrypted_value` is
/// opaque to every caller except the Tenant Tool Runtime, which decrypts it
/// immediately before injecting it into a subprocess environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantCredential {
    pub tenant_id: String,
    pub service_name: String,
    pub encrypted_value: String,
    pub updated_at: String,
}
