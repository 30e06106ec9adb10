//! Persistent CLI agent session store.
//!
//! Each tenant/sender conversation is driven by a real external agent CLI
//! child process rather than an in-process model client. Sessions are kept
//! alive across multiple messages and communicate over newline-delimited
//! JSON on stdin/stdout.

pub mod error;
pub mod manager;
pub mod session;
pub mod types;

pub use error::{CliError, Result};
pub use manager::CliSessionStore;
pub use session::CliSession;
pub use types::{CliFrame, CliSessionSpec};
