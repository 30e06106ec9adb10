use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::adapter::TriggerAdapter;
use crate::types::{Trigger, TriggerEvent};

/// Webhook triggers are purely reactive: an accepted HTTP request yields
/// exactly one event, pushed in by the gateway's webhook handler via
/// [`crate::registry::TriggerRegistry::handle_webhook`] rather than by this
/// adapter's own loop. `start`/`stop` are no-ops kept only so the registry
/// can treat every trigger kind uniformly.
pub struct WebhookAdapter {
    trigger: Trigger,
}

impl WebhookAdapter {
    pub fn new(trigger: Trigger) -> Self {
        Self { trigger }
    }

    pub fn event_from_payload(&self, payload: serde_json::Value) -> TriggerEvent {
        TriggerEvent {
            trigger_id: self.trigger.id.clone(),
            tenant_id: self.trigger.tenant_id.clone(),
            user_id: self.trigger.user_id.clone(),
            task_prompt: self.trigger.task_prompt.clone(),
            payload,
        }
    }
}

#[async_trait]
impl TriggerAdapter for WebhookAdapter {
    fn trigger_id(&self) -> &str {
        &self.trigger.id
    }

    async fn start(&self, _emit: mpsc::UnboundedSender<TriggerEvent>) {}

    async fn stop(&self) {}

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
