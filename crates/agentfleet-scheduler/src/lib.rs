//! `agentfleet-scheduler` — Tokio-based scheduled task runner with SQLite
//! persistence and a fleet-wide advisory lock so only one instance executes
//! a given cycle.
//!
//! Tasks are persisted to the `scheduled_tasks` table. [`engine::SchedulerEngine`]
//! ticks on an interval, claims the advisory lock, claims due tasks within
//! that lock, and dispatches each to a [`engine::TaskExecutor`] implemented
//! by the agent runtime glue.

pub mod db;
pub mod engine;
pub mod error;
pub mod lock;
pub mod schedule;
pub mod types;

pub use engine::{SchedulerEngine, TaskExecutor, MAX_ERROR_COUNT};
pub use error::{Result, SchedulerError};
pub use types::{ScheduledTask, TaskType};
