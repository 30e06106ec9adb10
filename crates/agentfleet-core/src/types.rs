use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a tenant (UUIDv7 — time-sortable for log correlation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Platform-native identifier for a message sender within a tenant's channel
/// (a phone number for WhatsApp, a chat id for Telegram). Opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SenderId(pub String);

impl SenderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SenderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SenderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Tenant + sender pair, the unit every conversation session and CLI
/// session store entry are keyed by.
///
/// Format: `tenant:{tenant_id}:sender:{sender_id}`. The colon-delimited
/// shape mirrors OpenClaw's session-key convention, reused here to identify
/// a (tenant, sender) unit instead of a (user, agent) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(pub String);

impl SessionKey {
    pub fn new(tenant_id: &TenantId, sender_id: &SenderId) -> Self {
        Self(format!("tenant:{}:sender:{}", tenant_id, sender_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse back into `(tenant_id, sender_id)`. Returns `None` rather than
    /// panicking on a malformed key read from storage.
    pub fn parse(&self) -> Option<(TenantId, SenderId)> {
        let mut parts = self.0.splitn(4, ':');
        let (tag1, tenant_id, tag2, sender_id) =
            (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
        if tag1 != "tenant" || tag2 != "sender" {
            return None;
        }
        Some((TenantId(tenant_id.to_string()), SenderId(sender_id.to_string())))
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A time-bounded claim of exclusive ownership, identified by `<hostname>-<pid>`.
///
/// Used uniformly for conversation-session leases, scheduled-task leases,
/// browser-session leases, and the scheduler's global advisory lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseOwner(pub String);

impl LeaseOwner {
    /// This process's lease identity: `<hostname>-<pid>`.
    pub fn this_process() -> Self {
        Self(format!("{}-{}", hostname(), std::process::id()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeaseOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .unwrap_or_else(|| "unknown-host".to_string())
}

/// Messaging channel a tenant is configured to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Whatsapp,
    Telegram,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Whatsapp => write!(f, "whatsapp"),
            ChannelKind::Telegram => write!(f, "telegram"),
        }
    }
}

impl std::str::FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "whatsapp" => Ok(ChannelKind::Whatsapp),
            "telegram" => Ok(ChannelKind::Telegram),
            other => Err(format!("unknown channel: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_roundtrips() {
        let tenant = TenantId::from("t-1");
        let sender = SenderId::from("+15551234567");
        let key = SessionKey::new(&tenant, &sender);
        let (t2, s2) = key.parse().expect("parse should succeed");
        assert_eq!(t2, tenant);
        assert_eq!(s2, sender);
    }

    #[test]
    fn session_key_parse_rejects_malformed() {
        let key = SessionKey("garbage".to_string());
        assert!(key.parse().is_none());
    }

    #[test]
    fn lease_owner_is_stable_within_process() {
        let a = LeaseOwner::this_process();
        let b = LeaseOwner::this_process();
        assert_eq!(a, b);
    }
}
