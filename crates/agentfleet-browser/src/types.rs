use serde::{Deserialize, Serialize};

/// Persistence row for a browser session. The live `headless_chrome` handle
/// itself never leaves the owning process, so this row carries only what's
/// needed for cross-instance bookkeeping: who owns it and when it expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSessionRow {
    pub id: String,
    pub tenant_id: String,
    pub persistent: bool,
    pub owner: String,
    pub created_at: String,
    pub last_used_at: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, Copy)]
pub struct BrowserLimits {
    pub max_per_tenant: usize,
    pub idle_ttl: std::time::Duration,
    pub persist_ttl: std::time::Duration,
}

impl Default for BrowserLimits {
    fn default() -> Self {
        Self {
            max_per_tenant: 5,
            idle_ttl: std::time::Duration::from_secs(30 * 60),
            persist_ttl: std::time::Duration::from_secs(24 * 60 * 60),
        }
    }
}
