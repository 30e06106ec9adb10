//! Agent Runtime glue: the entry points that stitch the Conversation
//! Session Manager, CLI Session Store, Tenant Tool Runtime bootstrap, and
//! Messaging Channel Resolver together into one turn, for inbound messages,
//! scheduled tasks, and trigger-fired executions alike.

pub mod command;
pub mod error;
pub mod executor;
pub mod protocol;
pub mod runtime;

pub use command::AgentCommand;
pub use error::{AgentError, Result};
pub use executor::run_trigger_consumer;
pub use runtime::{AgentRuntime, AgentRuntimeConfig};
