use agentfleet_core::{SenderId, SessionKey, TenantId};
use serde::{Deserialize, Serialize};

/// A persisted conversation session between one tenant and one sender.
///
/// Exactly one session exists per `(tenant_id, sender_id)` pair at a time.
/// While a process holds the lease it is the sole writer of inbound/outbound
/// messages for that session; the lease expires automatically if the holder
/// crashes or is replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// UUIDv7 primary key — time-sortable.
    pub id: String,
    pub tenant_id: TenantId,
    pub sender_id: SenderId,
    /// RFC3339 timestamp the session was first created.
    pub started_at: String,
    /// RFC3339 timestamp of the most recent inbound or outbound message.
    pub last_activity_at: String,
    /// Set when the session is explicitly ended (e.g. by `/reset`).
    pub ended_at: Option<String>,
    /// `<hostname>-<pid>` of the process currently holding the lease.
    pub lease_owner: Option<String>,
    /// RFC3339 expiry of the current lease.
    pub lease_expires_at: Option<String>,
}

impl Session {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.tenant_id, &self.sender_id)
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// Direction of a persisted message relative to the tenant's agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

impl std::fmt::Display for MessageDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageDirection::Inbound => write!(f, "inbound"),
            MessageDirection::Outbound => write!(f, "outbound"),
        }
    }
}

impl std::str::FromStr for MessageDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "inbound" => Ok(MessageDirection::Inbound),
            "outbound" => Ok(MessageDirection::Outbound),
            other => Err(format!("unknown message direction: {other}")),
        }
    }
}

/// Delivery state of an outbound message as reported by the channel
/// transport. Inbound messages are recorded as `Delivered` immediately —
/// there is nothing further to track once they've been received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Delivered => write!(f, "delivered"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "sent" => Ok(DeliveryStatus::Sent),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(format!("unknown delivery status: {other}")),
        }
    }
}

/// An immutable record of one inbound or outbound message. Full-text search
/// indexes `content`; a composite index covers `(tenant_id, sender_id,
/// created_at DESC)` for conversation-history reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub tenant_id: TenantId,
    pub sender_id: SenderId,
    pub session_id: String,
    /// The provider's own message id (channel-assigned), when known.
    pub external_id: Option<String>,
    pub direction: MessageDirection,
    pub content: String,
    pub delivery_status: DeliveryStatus,
    pub created_at: String,
}
