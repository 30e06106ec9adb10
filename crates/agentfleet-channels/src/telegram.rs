use std::sync::Mutex as StdMutex;

use agentfleet_core::config::TelegramConfig;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::channel::Channel;
use crate::chunking::{escape_markdown_v2, split_chunks_smart};
use crate::error::ChannelError;
use crate::http::post_json_with_retry;
use crate::types::{ChannelStatus, OutboundMessage};

/// Telegram's message limit is 4096 characters; 4090 leaves headroom for
/// fence-closing when a split lands inside a code block.
const CHUNK_MAX: usize = 4090;

pub struct TelegramChannel {
    client: reqwest::Client,
    bot_token: String,
    status: StdMutex<ChannelStatus>,
}

impl TelegramChannel {
    pub fn new(cfg: &TelegramConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_token: cfg.bot_token.clone(),
            status: StdMutex::new(ChannelStatus::Disconnected),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        let body = serde_json::json!({});
        let resp = post_json_with_retry(&self.client, &self.method_url("getMe"), None, &body, "telegram").await?;
        if resp["ok"].as_bool() != Some(true) {
            return Err(ChannelError::AuthFailed("telegram getMe rejected bot token".into()));
        }
        *self.status.lock().unwrap() = ChannelStatus::Connected;
        info!("telegram channel connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        *self.status.lock().unwrap() = ChannelStatus::Disconnected;
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<String, ChannelError> {
        let chunks = split_chunks_smart(&msg.content, CHUNK_MAX);
        let mut last_id = String::new();

        for (i, chunk) in chunks.iter().enumerate() {
            let escaped = escape_markdown_v2(chunk);
            let markdown_body = serde_json::json!({
                "chat_id": msg.recipient_id,
                "text": escaped,
                "parse_mode": "MarkdownV2",
            });

            let resp = match post_json_with_retry(
                &self.client,
                &self.method_url("sendMessage"),
                None,
                &markdown_body,
                "telegram",
            )
            .await
            {
                Ok(resp) if resp["ok"].as_bool() == Some(true) => resp,
                _ => {
                    warn!(chunk_index = i, "telegram rejected markdown, falling back to plain text");
                    let plain_body = serde_json::json!({
                        "chat_id": msg.recipient_id,
                        "text": chunk,
                    });
                    post_json_with_retry(&self.client, &self.method_url("sendMessage"), None, &plain_body, "telegram")
                        .await?
                }
            };

            last_id = resp["result"]["message_id"]
                .as_i64()
                .map(|id| id.to_string())
                .unwrap_or_default();

            if i + 1 < chunks.len() {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }

        Ok(last_id)
    }

    fn status(&self) -> ChannelStatus {
        self.status.lock().unwrap().clone()
    }
}
