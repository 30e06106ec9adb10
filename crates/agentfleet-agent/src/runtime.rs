//! Stitches the Conversation Session Manager, CLI Session Store, Tenant
//! Runtime, and Messaging Channel Resolver together for the three ways a
//! turn can start: an inbound user message, a scheduled-task execution, and
//! a trigger-fired execution.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tracing::{instrument, warn};

use agentfleet_channels::{ChannelManager, MessageFormat, OutboundMessage};
use agentfleet_cli::{CliSessionSpec, CliSessionStore};
use agentfleet_core::{ChannelKind, SenderId, SessionKey, TenantId};
use agentfleet_hooks::{HookContext, HookEngine, HookEvent};
use agentfleet_sessions::{DeliveryStatus, SessionManager};
use agentfleet_tenants::TenantManager;

use crate::command::AgentCommand;
use crate::error::{AgentError, Result};
use crate::protocol::{build_prompt_frame, parse_response_frame};

/// The final prompt injected into an outgoing CLI session before it closes.
const REFLECTION_PROMPT: &str =
    "This conversation is ending. Reflect briefly and record anything worth remembering.";

#[derive(Debug, Clone)]
pub struct AgentRuntimeConfig {
    /// Executable spawned for a tenant's CLI agent session.
    pub cli_command: String,
    pub cli_args: Vec<String>,
    /// Wall-clock budget for a single prompt/response round trip.
    pub cli_timeout_ms: u64,
    pub lease_ttl_secs: i64,
    /// A session idle past this many hours is ended and replaced on its
    /// next message rather than resumed.
    pub idle_hours: i64,
}

/// Central glue struct — one instance shared process-wide via `Arc`.
pub struct AgentRuntime {
    sessions: Arc<SessionManager>,
    cli: Arc<CliSessionStore>,
    tenants: Arc<TenantManager>,
    channels: Arc<ChannelManager>,
    hooks: Option<Arc<HookEngine>>,
    config: AgentRuntimeConfig,
}

impl AgentRuntime {
    pub fn new(
        sessions: Arc<SessionManager>,
        cli: Arc<CliSessionStore>,
        tenants: Arc<TenantManager>,
        channels: Arc<ChannelManager>,
        config: AgentRuntimeConfig,
    ) -> Self {
        Self {
            sessions,
            cli,
            tenants,
            channels,
            hooks: None,
            config,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<HookEngine>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Entry point for an inbound user message arriving on a channel adapter.
    ///
    /// `campaign_state` is an opaque snapshot supplied by an external
    /// collaborator (the campaign/CRM feature set is out of scope here); pass
    /// `None` when there is none to attach.
    #[instrument(skip(self, content, campaign_state), fields(tenant_id = %tenant_id, sender_id = %sender_id))]
    pub async fn handle_inbound_message(
        &self,
        tenant_id: &TenantId,
        sender_id: &SenderId,
        external_id: Option<&str>,
        content: &str,
        campaign_state: Option<&str>,
    ) -> Result<()> {
        self.tenants.ensure_bootstrap(tenant_id.as_str())?;

        let tenant = self
            .tenants
            .get_tenant(tenant_id.as_str())?
            .ok_or_else(|| AgentError::UnknownTenant(tenant_id.as_str().to_string()))?;

        let (session, is_new) = self.sessions.get_or_create(
            tenant_id,
            sender_id,
            self.config.lease_ttl_secs,
            self.config.idle_hours,
        )?;
        self.sessions
            .record_inbound(tenant_id, sender_id, &session.id, external_id, content)?;

        let key = SessionKey::new(tenant_id, sender_id);

        if is_new {
            // A fresh conversation session must not inherit the long-lived
            // CLI child's context from whatever came before it.
            let _ = self.cli.close(&key).await;
        }

        if let Some(command) = AgentCommand::parse(content) {
            return self
                .handle_command(
                    tenant_id,
                    sender_id,
                    &session.id,
                    &key,
                    tenant.channel,
                    &tenant.recipient_id,
                    command,
                )
                .await;
        }

        let prompt = build_context_prefix(&tenant.onboarding_phase, campaign_state, content);
        let reply = self.invoke_cli_turn(tenant_id, sender_id, &key, &prompt).await?;

        self.deliver_reply(
            tenant_id,
            sender_id,
            &session.id,
            tenant.channel,
            &tenant.recipient_id,
            &reply,
        )
        .await?;

        self.log_timeline(tenant_id.as_str(), content, &reply);
        Ok(())
    }

    /// Entry point shared by the Scheduler and the Trigger Evaluator: run one
    /// task prompt through the agent and deliver the reply, without the
    /// user-message command bypass.
    #[instrument(skip(self, task_prompt, previous_outputs), fields(tenant_id = %tenant_id, sender_id = %sender_id, task_type))]
    pub async fn dispatch_task(
        &self,
        tenant_id: &TenantId,
        sender_id: &SenderId,
        task_type: &str,
        task_prompt: &str,
        previous_outputs: &[String],
    ) -> Result<String> {
        self.tenants.ensure_bootstrap(tenant_id.as_str())?;

        let tenant = self
            .tenants
            .get_tenant(tenant_id.as_str())?
            .ok_or_else(|| AgentError::UnknownTenant(tenant_id.as_str().to_string()))?;

        let (session, is_new) = self.sessions.get_or_create(
            tenant_id,
            sender_id,
            self.config.lease_ttl_secs,
            self.config.idle_hours,
        )?;
        let key = SessionKey::new(tenant_id, sender_id);

        if is_new {
            let _ = self.cli.close(&key).await;
        }

        let mut prompt = format!("[task_type={task_type}]\n{task_prompt}");
        if !previous_outputs.is_empty() {
            prompt.push_str("\n\nPrevious outputs:\n");
            prompt.push_str(&previous_outputs.join("\n---\n"));
        }

        let reply = self.invoke_cli_turn(tenant_id, sender_id, &key, &prompt).await?;

        self.deliver_reply(
            tenant_id,
            sender_id,
            &session.id,
            tenant.channel,
            &tenant.recipient_id,
            &reply,
        )
        .await?;

        self.log_timeline(tenant_id.as_str(), &prompt, &reply);
        Ok(reply)
    }

    async fn handle_command(
        &self,
        tenant_id: &TenantId,
        sender_id: &SenderId,
        session_id: &str,
        key: &SessionKey,
        channel: ChannelKind,
        recipient_id: &str,
        command: AgentCommand,
    ) -> Result<()> {
        let ack = match command {
            AgentCommand::Reset | AgentCommand::New => {
                self.fire_reflection_hook(tenant_id, sender_id, key).await;
                let _ = self.cli.close(key).await;
                self.sessions.end(tenant_id, sender_id)?;
                "Session reset — starting fresh."
            }
            AgentCommand::Reonboard => {
                self.tenants.set_onboarding_phase(tenant_id.as_str(), "")?;
                "Onboarding restarted."
            }
            AgentCommand::Cancel => {
                let _ = self.cli.close(key).await;
                "Cancelled."
            }
        };

        self.deliver_reply(tenant_id, sender_id, session_id, channel, recipient_id, ack)
            .await
    }

    /// Inject a prompt into the tenant/sender's CLI session (spawning one if
    /// none is running) and await the response frame.
    async fn invoke_cli_turn(
        &self,
        tenant_id: &TenantId,
        sender_id: &SenderId,
        key: &SessionKey,
        prompt: &str,
    ) -> Result<String> {
        let spec = self.cli_spec(tenant_id, sender_id);
        let frame = build_prompt_frame(prompt);
        let session = self.cli.inject_message(key, spec, &frame).await?;
        let value = session.recv_frame(self.config.cli_timeout_ms).await?;
        parse_response_frame(value)
    }

    fn cli_spec(&self, tenant_id: &TenantId, sender_id: &SenderId) -> CliSessionSpec {
        let cwd = self.tenants.tenant_dir(tenant_id.as_str());
        let mut env = HashMap::new();
        env.insert("AGENTFLEET_TENANT_ID".to_string(), tenant_id.as_str().to_string());
        env.insert("AGENTFLEET_SENDER_ID".to_string(), sender_id.as_str().to_string());
        CliSessionSpec {
            command: self.config.cli_command.clone(),
            args: self.config.cli_args.clone(),
            cwd: cwd.to_string_lossy().into_owned(),
            env,
        }
    }

    /// Record the outbound message, deliver it through the resolved channel
    /// transport, and update its delivery status with the outcome.
    async fn deliver_reply(
        &self,
        tenant_id: &TenantId,
        sender_id: &SenderId,
        session_id: &str,
        channel: ChannelKind,
        recipient_id: &str,
        content: &str,
    ) -> Result<()> {
        let outbound = self
            .sessions
            .record_outbound(tenant_id, sender_id, session_id, content)?;

        let channel_name = channel.to_string();
        let transport = self
            .channels
            .get(&channel_name)
            .ok_or_else(|| AgentError::UnknownChannel(channel_name.clone()))?;

        let message = OutboundMessage {
            channel: channel_name,
            recipient_id: recipient_id.to_string(),
            content: content.to_string(),
            format: MessageFormat::PlainText,
        };

        match transport.send(&message).await {
            Ok(provider_id) => {
                self.sessions
                    .set_delivery_status(&outbound.id, DeliveryStatus::Sent, Some(&provider_id))?;
                Ok(())
            }
            Err(e) => {
                self.sessions
                    .set_delivery_status(&outbound.id, DeliveryStatus::Failed, None)?;
                Err(AgentError::Channel(e))
            }
        }
    }

    /// Give the outgoing CLI session one last chance to reflect before it
    /// closes. Best-effort: failures are logged and swallowed, never
    /// propagated — a broken reflection hook must not block a reset.
    async fn fire_reflection_hook(&self, tenant_id: &TenantId, sender_id: &SenderId, key: &SessionKey) {
        if let Some(engine) = &self.hooks {
            let mut ctx = HookContext::new(
                HookEvent::SessionEnd,
                serde_json::json!({ "tenant_id": tenant_id.as_str(), "sender_id": sender_id.as_str() }),
            );
            ctx.sender_id = Some(sender_id.clone());
            ctx.session_key = Some(key.clone());
            engine.emit_after(ctx);
        }

        if self.cli.has(key) {
            if let Ok(session) = self.cli.get(key) {
                let frame = build_prompt_frame(REFLECTION_PROMPT);
                if let Err(e) = session.inject_message(&frame).await {
                    warn!(error = %e, "reflection hook failed to inject final prompt");
                }
            }
        }
    }

    /// Append one line to the tenant's daily timeline file. Best-effort —
    /// a write failure is logged, never propagated.
    fn log_timeline(&self, tenant_id: &str, inbound: &str, outbound: &str) {
        let dir = self.tenants.tenant_dir(tenant_id).join("timeline");
        let day = chrono::Utc::now().format("%Y-%m-%d").to_string();
        if let Err(e) = append_timeline_entry(&dir, &day, inbound, outbound) {
            warn!(tenant_id, error = %e, "failed to append timeline entry");
        }
    }
}

fn append_timeline_entry(dir: &Path, day: &str, inbound: &str, outbound: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let entry = serde_json::json!({
        "at": chrono::Utc::now().to_rfc3339(),
        "inbound": inbound,
        "outbound": outbound,
    });
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{day}.jsonl")))?;
    writeln!(file, "{entry}")
}

/// Build the small context prefix carrying onboarding phase and campaign
/// state ahead of the user's actual message. Both are opaque strings
/// produced by external collaborators — this glue only concatenates them.
fn build_context_prefix(onboarding_phase: &str, campaign_state: Option<&str>, content: &str) -> String {
    let mut prefix = String::new();
    if !onboarding_phase.is_empty() {
        prefix.push_str(&format!("[onboarding_phase={onboarding_phase}]\n"));
    }
    if let Some(state) = campaign_state.filter(|s| !s.is_empty()) {
        prefix.push_str(&format!("[campaign_state={state}]\n"));
    }
    if prefix.is_empty() {
        content.to_string()
    } else {
        prefix.push_str(content);
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_untouched_with_no_context() {
        assert_eq!(build_context_prefix("", None, "hi"), "hi");
    }

    #[test]
    fn prefix_carries_onboarding_phase_and_campaign_state() {
        let prefixed = build_context_prefix("awaiting_name", Some("lead:warm"), "hi");
        assert!(prefixed.starts_with("[onboarding_phase=awaiting_name]\n"));
        assert!(prefixed.contains("[campaign_state=lead:warm]\n"));
        assert!(prefixed.ends_with("hi"));
    }
}
