use std::collections::HashMap;

/// Parameters used to spawn a tenant's CLI agent child process.
#[derive(Debug, Clone)]
pub struct CliSessionSpec {
    /// Executable to run (the external agent CLI).
    pub command: String,
    pub args: Vec<String>,
    pub cwd: String,
    pub env: HashMap<String, String>,
}

/// A single newline-delimited JSON frame read from the child's stdout.
#[derive(Debug, Clone)]
pub struct CliFrame(pub serde_json::Value);
