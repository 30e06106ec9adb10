use serde::{Deserialize, Serialize};

/// What kind of thing firing this task does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Deliver a prompt to the tenant as a reminder message.
    Reminder,
    /// Drive the agent runtime through a prompt and deliver its reply.
    Execute,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskType::Reminder => "reminder",
            TaskType::Execute => "execute",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "reminder" => Ok(TaskType::Reminder),
            "execute" => Ok(TaskType::Execute),
            other => Err(format!("unknown task type: {other}")),
        }
    }
}

/// A persisted scheduled task. Exactly one of `cron_expr` / `run_at` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub task_prompt: String,
    pub task_type: TaskType,
    pub is_one_time: bool,
    pub cron_expr: Option<String>,
    pub run_at: Option<String>,
    /// IANA timezone name the cron expression is interpreted in.
    pub timezone: String,
    pub next_run_at: String,
    pub enabled: bool,
    pub error_count: u32,
    pub last_error: Option<String>,
    pub lease_owner: Option<String>,
    pub lease_expires_at: Option<String>,
    /// Bounded history of past execution outputs, newest last.
    pub previous_outputs: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Maximum entries kept in `previous_outputs` before the oldest is dropped.
pub const PREVIOUS_OUTPUTS_CAP: usize = 10;

impl ScheduledTask {
    pub fn push_output(&mut self, output: String) {
        self.previous_outputs.push(output);
        if self.previous_outputs.len() > PREVIOUS_OUTPUTS_CAP {
            let excess = self.previous_outputs.len() - PREVIOUS_OUTPUTS_CAP;
            self.previous_outputs.drain(..excess);
        }
    }
}
