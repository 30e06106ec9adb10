pub mod channel;
pub mod chunking;
pub mod error;
pub mod http;
pub mod manager;
pub mod resolver;
pub mod telegram;
pub mod types;
pub mod whatsapp;

pub use channel::Channel;
pub use error::ChannelError;
pub use manager::ChannelManager;
pub use resolver::ChannelResolver;
pub use telegram::TelegramChannel;
pub use types::{ChannelStatus, InboundMessage, MessageFormat, OutboundMessage};
pub use whatsapp::WhatsappChannel;
