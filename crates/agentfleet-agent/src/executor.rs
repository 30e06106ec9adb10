//! Adapters binding the Agent Runtime to the Scheduler's `TaskExecutor`
//! trait and to the Trigger Evaluator's event stream, so both entry points
//! dispatch through the exact same [`AgentRuntime::dispatch_task`] path.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use agentfleet_core::{SenderId, TenantId};
use agentfleet_scheduler::{ScheduledTask, TaskExecutor};
use agentfleet_triggers::TriggerEvent;

use crate::runtime::AgentRuntime;

#[async_trait]
impl TaskExecutor for AgentRuntime {
    async fn execute(&self, task: &ScheduledTask) -> std::result::Result<String, String> {
        let tenant_id = TenantId::from(task.tenant_id.clone());
        let sender_id = SenderId::from(task.user_id.clone());
        self.dispatch_task(
            &tenant_id,
            &sender_id,
            &task.task_type.to_string(),
            &task.task_prompt,
            &task.previous_outputs,
        )
        .await
        .map_err(|e| e.to_string())
    }
}

/// Drain trigger events off `rx`, dispatching each through the agent
/// runtime. Runs until the channel closes; one event's failure is logged
/// and does not stop the loop — trigger fires are independent of each other.
pub async fn run_trigger_consumer(
    runtime: Arc<AgentRuntime>,
    mut rx: mpsc::UnboundedReceiver<TriggerEvent>,
) {
    while let Some(event) = rx.recv().await {
        let tenant_id = TenantId::from(event.tenant_id.clone());
        let sender_id = SenderId::from(event.user_id.clone());
        if let Err(e) = runtime
            .dispatch_task(&tenant_id, &sender_id, "trigger", &event.task_prompt, &[])
            .await
        {
            warn!(trigger_id = %event.trigger_id, error = %e, "trigger-fired execution failed");
        }
    }
}
