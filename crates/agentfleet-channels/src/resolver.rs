use agentfleet_core::config::{TelegramConfig, WhatsappConfig};
use agentfleet_core::ChannelKind;

use crate::channel::Channel;
use crate::telegram::TelegramChannel;
use crate::whatsapp::WhatsappChannel;

/// Builds the concrete transport for a tenant's channel configuration and
/// maps a canonical sender id to that channel's native recipient id.
pub struct ChannelResolver;

impl ChannelResolver {
    pub fn whatsapp(cfg: &WhatsappConfig) -> Box<dyn Channel> {
        Box::new(WhatsappChannel::new(cfg))
    }

    pub fn telegram(cfg: &TelegramConfig) -> Box<dyn Channel> {
        Box::new(TelegramChannel::new(cfg))
    }

    /// Map a canonical sender identifier (as stored in a session key) to the
    /// channel's own addressing scheme. WhatsApp addresses by bare E.164
    /// digits; Telegram already stores the chat id as the canonical sender.
    pub fn native_recipient_id(kind: ChannelKind, canonical_sender_id: &str) -> String {
        match kind {
            ChannelKind::Whatsapp => canonical_sender_id.trim_start_matches('+').to_string(),
            ChannelKind::Telegram => canonical_sender_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whatsapp_recipient_strips_leading_plus() {
        assert_eq!(
            ChannelResolver::native_recipient_id(ChannelKind::Whatsapp, "+15551234567"),
            "15551234567"
        );
    }

    #[test]
    fn telegram_recipient_passes_through() {
        assert_eq!(
            ChannelResolver::native_recipient_id(ChannelKind::Telegram, "987654321"),
            "987654321"
        );
    }
}
