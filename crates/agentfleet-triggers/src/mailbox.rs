use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

use crate::adapter::TriggerAdapter;
use crate::types::{DedupCache, Trigger, TriggerEvent};

/// Minimum poll floor for mailbox adapters, regardless of configured interval.
pub const MIN_POLL_SECS: i64 = 300;

/// Default dedup cache size (last N provider message ids remembered).
pub const DEFAULT_DEDUP_CAP: usize = 100;

#[derive(Debug, Clone)]
pub struct MailboxItem {
    pub provider_message_id: String,
    pub text: String,
}

/// Authenticates per tenant using stored credentials and fetches new unread
/// items. Token refresh is the source's responsibility — transparent to
/// this adapter.
#[async_trait]
pub trait MailboxSource: Send + Sync {
    async fn fetch_new(&self, tenant_id: &str, config: &serde_json::Value) -> Vec<MailboxItem>;
}

pub struct MailboxAdapter {
    trigger: Trigger,
    source: Arc<dyn MailboxSource>,
    dedup: Mutex<DedupCache>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl MailboxAdapter {
    pub fn new(trigger: Trigger, source: Arc<dyn MailboxSource>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            trigger,
            source,
            dedup: Mutex::new(DedupCache::new(DEFAULT_DEDUP_CAP)),
            shutdown_tx,
            shutdown_rx,
        }
    }
}

#[async_trait]
impl TriggerAdapter for MailboxAdapter {
    fn trigger_id(&self) -> &str {
        &self.trigger.id
    }

    async fn start(&self, emit: mpsc::UnboundedSender<TriggerEvent>) {
        let interval_secs = self.trigger.interval_secs.max(MIN_POLL_SECS) as u64;
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let items = self.source.fetch_new(&self.trigger.tenant_id, &self.trigger.config).await;
                    let mut dedup = self.dedup.lock().await;
                    for item in items {
                        if !dedup.insert_if_new(&item.provider_message_id) {
                            continue;
                        }
                        let event = TriggerEvent {
                            trigger_id: self.trigger.id.clone(),
                            tenant_id: self.trigger.tenant_id.clone(),
                            user_id: self.trigger.user_id.clone(),
                            task_prompt: self.trigger.task_prompt.clone(),
                            payload: serde_json::json!({
                                "provider_message_id": item.provider_message_id,
                                "text": item.text,
                            }),
                        };
                        if emit.send(event).is_err() {
                            return;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Vec<MailboxItem>);

    #[async_trait]
    impl MailboxSource for FixedSource {
        async fn fetch_new(&self, _tenant_id: &str, _config: &serde_json::Value) -> Vec<MailboxItem> {
            self.0.clone()
        }
    }

    #[test]
    fn poll_floor_is_enforced() {
        let trigger = Trigger {
            id: "trg-1".into(),
            tenant_id: "t-1".into(),
            user_id: "u-1".into(),
            kind: crate::types::TriggerKind::Mailbox,
            task_prompt: "check mail".into(),
            config: serde_json::json!({}),
            cooldown_secs: 0,
            interval_secs: 10,
            enabled: true,
            last_triggered_at: None,
            next_check_at: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let adapter = MailboxAdapter::new(trigger, Arc::new(FixedSource(vec![])));
        assert_eq!(adapter.trigger.interval_secs.max(MIN_POLL_SECS), MIN_POLL_SECS);
    }
}
