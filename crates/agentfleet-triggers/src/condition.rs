use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::adapter::TriggerAdapter;
use crate::types::{Trigger, TriggerEvent};

/// Opaque condition predicate, evaluated against tenant state. What the
/// predicate actually inspects is owned by the caller (administrative
/// config, external API, etc.) — this adapter only cares about the
/// false→true transition.
#[async_trait]
pub trait ConditionSource: Send + Sync {
    async fn evaluate(&self, tenant_id: &str, config: &serde_json::Value) -> bool;
}

pub struct ConditionAdapter {
    trigger: Trigger,
    source: Arc<dyn ConditionSource>,
    previous: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ConditionAdapter {
    pub fn new(trigger: Trigger, source: Arc<dyn ConditionSource>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            trigger,
            source,
            previous: AtomicBool::new(false),
            shutdown_tx,
            shutdown_rx,
        }
    }
}

#[async_trait]
impl TriggerAdapter for ConditionAdapter {
    fn trigger_id(&self) -> &str {
        &self.trigger.id
    }

    async fn start(&self, emit: mpsc::UnboundedSender<TriggerEvent>) {
        let interval_secs = self.trigger.interval_secs.max(1) as u64;
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        let mut shutdown = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = self.source.evaluate(&self.trigger.tenant_id, &self.trigger.config).await;
                    let was = self.previous.swap(now, Ordering::AcqRel);
                    if !was && now {
                        let event = TriggerEvent {
                            trigger_id: self.trigger.id.clone(),
                            tenant_id: self.trigger.tenant_id.clone(),
                            user_id: self.trigger.user_id.clone(),
                            task_prompt: self.trigger.task_prompt.clone(),
                            payload: serde_json::json!({"kind": "condition"}),
                        };
                        if emit.send(event).is_err() {
                            break;
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
