use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Webhook,
    Condition,
    Mailbox,
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TriggerKind::Webhook => "webhook",
            TriggerKind::Condition => "condition",
            TriggerKind::Mailbox => "mailbox",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TriggerKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "webhook" => Ok(TriggerKind::Webhook),
            "condition" => Ok(TriggerKind::Condition),
            "mailbox" => Ok(TriggerKind::Mailbox),
            other => Err(format!("unknown trigger kind: {other}")),
        }
    }
}

/// A persisted trigger configuration. `config` is an opaque JSON blob whose
/// shape is owned by the adapter identified by `kind` (predicate source for
/// Condition, mailbox credentials reference for Mailbox, nothing for Webhook).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub kind: TriggerKind,
    pub task_prompt: String,
    pub config: serde_json::Value,
    pub cooldown_secs: i64,
    pub interval_secs: i64,
    pub enabled: bool,
    pub last_triggered_at: Option<String>,
    pub next_check_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One qualifying occurrence surfaced by an adapter.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub trigger_id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub task_prompt: String,
    pub payload: serde_json::Value,
}

/// Bounded last-N dedup cache keyed by provider message id, used by the
/// mailbox adapter. Default capacity 100.
pub struct DedupCache {
    seen: std::collections::VecDeque<String>,
    set: std::collections::HashSet<String>,
    cap: usize,
}

impl DedupCache {
    pub fn new(cap: usize) -> Self {
        Self {
            seen: std::collections::VecDeque::with_capacity(cap),
            set: std::collections::HashSet::with_capacity(cap),
            cap,
        }
    }

    /// Returns `true` if `id` was not previously seen (and records it now).
    pub fn insert_if_new(&mut self, id: &str) -> bool {
        if self.set.contains(id) {
            return false;
        }
        if self.seen.len() >= self.cap {
            if let Some(oldest) = self.seen.pop_front() {
                self.set.remove(&oldest);
            }
        }
        self.seen.push_back(id.to_string());
        self.set.insert(id.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_cache_evicts_oldest_beyond_capacity() {
        let mut cache = DedupCache::new(2);
        assert!(cache.insert_if_new("a"));
        assert!(cache.insert_if_new("b"));
        assert!(!cache.insert_if_new("a"));
        assert!(cache.insert_if_new("c"));
        // "a" was evicted to make room for "c"; it's treated as new again.
        assert!(cache.insert_if_new("a"));
    }
}
