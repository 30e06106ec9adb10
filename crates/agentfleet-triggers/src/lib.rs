pub mod adapter;
pub mod condition;
pub mod db;
pub mod error;
pub mod mailbox;
pub mod registry;
pub mod types;
pub mod webhook;

pub use adapter::TriggerAdapter;
pub use condition::{ConditionAdapter, ConditionSource};
pub use error::{Result, TriggerError};
pub use mailbox::{MailboxAdapter, MailboxItem, MailboxSource};
pub use registry::TriggerRegistry;
pub use types::{DedupCache, Trigger, TriggerEvent, TriggerKind};
pub use webhook::WebhookAdapter;
