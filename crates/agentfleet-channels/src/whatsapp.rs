use std::sync::Mutex as StdMutex;

use agentfleet_core::config::WhatsappConfig;
use async_trait::async_trait;
use tracing::info;

use crate::channel::Channel;
use crate::chunking::split_chunks_smart;
use crate::error::ChannelError;
use crate::http::post_json_with_retry;
use crate::types::{ChannelStatus, OutboundMessage};

/// WhatsApp Cloud API's text body limit (1024 chars for interactive
/// messages, 4096 for plain text bodies).
const CHUNK_MAX: usize = 4096;

pub struct WhatsappChannel {
    client: reqwest::Client,
    phone_number_id: String,
    access_token: String,
    status: StdMutex<ChannelStatus>,
}

impl WhatsappChannel {
    pub fn new(cfg: &WhatsappConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            phone_number_id: cfg.phone_number_id.clone(),
            access_token: cfg.access_token.clone(),
            status: StdMutex::new(ChannelStatus::Disconnected),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://graph.facebook.com/v19.0/{}/messages",
            self.phone_number_id
        )
    }
}

#[async_trait]
impl Channel for WhatsappChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        // The Cloud API is pure REST; there's no persistent connection to
        // open. Credential validity is only proven on first send.
        *self.status.lock().unwrap() = ChannelStatus::Connected;
        info!("whatsapp channel ready");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        *self.status.lock().unwrap() = ChannelStatus::Disconnected;
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<String, ChannelError> {
        let chunks = split_chunks_smart(&msg.content, CHUNK_MAX);
        let mut last_id = String::new();

        for chunk in chunks {
            let body = serde_json::json!({
                "messaging_product": "whatsapp",
                "to": msg.recipient_id,
                "type": "text",
                "text": { "body": chunk },
            });
            let auth = format!("Bearer {}", self.access_token);
            let resp =
                post_json_with_retry(&self.client, &self.endpoint(), Some(("Authorization", &auth)), &body, "whatsapp")
                    .await?;

            last_id = resp["messages"][0]["id"]
                .as_str()
                .unwrap_or_default()
                .to_string();
        }

        Ok(last_id)
    }

    fn status(&self) -> ChannelStatus {
        self.status.lock().unwrap().clone()
    }
}
