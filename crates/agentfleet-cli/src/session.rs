//! A persistent CLI agent session: a real child process wired over
//! newline-delimited JSON, not a one-shot invocation.
//!
//! Each `CliSession` owns a spawned child and two independent async I/O
//! tasks: one parses stdout into framed JSON values and forwards them to a
//! response queue, the other drains stderr into a bounded ring buffer for
//! diagnostics. Both tasks flip `alive` to `false` when the child's pipes
//! close so callers can detect an unexpectedly-dead agent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::error::{CliError, Result};
use crate::types::{CliFrame, CliSessionSpec};

/// Maximum bytes kept in the stderr ring buffer (64 KiB).
const STDERR_BUF_MAX: usize = 65_536;

pub struct CliSession {
    pub spec: CliSessionSpec,
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    frames: Mutex<mpsc::UnboundedReceiver<CliFrame>>,
    stderr_buf: Arc<Mutex<String>>,
    alive: Arc<AtomicBool>,
}

impl CliSession {
    /// Spawn the child process described by `spec` and start its I/O loops.
    pub async fn spawn(spec: CliSessionSpec) -> Result<Self> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(&spec.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| CliError::SpawnFailed(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CliError::SpawnFailed("no stdin handle".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CliError::SpawnFailed("no stdout handle".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CliError::SpawnFailed("no stderr handle".to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));
        let stderr_buf: Arc<Mutex<String>> = Arc::new(Mutex::new(String::new()));

        let alive_stdout = Arc::clone(&alive);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<serde_json::Value>(&line) {
                            Ok(value) => {
                                if tx.send(CliFrame(value)).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("dropping malformed CLI frame: {e}"),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("CLI stdout reader error: {e}");
                        break;
                    }
                }
            }
            alive_stdout.store(false, Ordering::Release);
            debug!("CLI stdout reader exited");
        });

        let alive_stderr = Arc::clone(&alive);
        let stderr_buf_clone = Arc::clone(&stderr_buf);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let mut guard = stderr_buf_clone.lock().await;
                guard.push_str(&line);
                guard.push('\n');
                if guard.len() > STDERR_BUF_MAX {
                    let excess = guard.len() - STDERR_BUF_MAX;
                    guard.drain(..excess);
                }
            }
            // Don't flip alive here — stdout closing is the authoritative
            // signal; stderr can close first on some platforms.
            let _ = alive_stderr.load(Ordering::Acquire);
            debug!("CLI stderr drainer exited");
        });

        Ok(Self {
            spec,
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            frames: Mutex::new(rx),
            stderr_buf,
            alive,
        })
    }

    /// Write one JSON value as a newline-delimited frame to the child's stdin.
    pub async fn inject_message(&self, value: &serde_json::Value) -> Result<()> {
        if !self.is_alive() {
            return Err(CliError::Closed(self.spec.command.clone()));
        }
        let mut line = serde_json::to_string(value)?;
        line.push('\n');
        let mut guard = self.stdin.lock().await;
        guard.write_all(line.as_bytes()).await?;
        guard.flush().await?;
        Ok(())
    }

    /// Wait for the next frame the child writes to stdout, up to `timeout_ms`.
    pub async fn recv_frame(&self, timeout_ms: u64) -> Result<serde_json::Value> {
        let mut guard = self.frames.lock().await;
        match tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            guard.recv(),
        )
        .await
        {
            Ok(Some(frame)) => Ok(frame.0),
            Ok(None) => Err(CliError::Closed(self.spec.command.clone())),
            Err(_) => Err(CliError::Timeout { ms: timeout_ms }),
        }
    }

    /// Most recent stderr output (for diagnostics when an agent misbehaves).
    pub async fn drain_stderr(&self) -> String {
        let mut guard = self.stderr_buf.lock().await;
        std::mem::take(&mut *guard)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Terminate the child process. SIGKILL on unix via `Child::kill`.
    pub async fn close(&self) -> Result<()> {
        let mut child = self.child.lock().await;
        let _ = child.start_kill();
        self.alive.store(false, Ordering::Release);
        Ok(())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::MalformedFrame(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn echo_spec() -> CliSessionSpec {
        CliSessionSpec {
            command: "cat".to_string(),
            args: vec![],
            cwd: "/tmp".to_string(),
            env: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn injects_and_receives_a_frame() {
        let session = CliSession::spawn(echo_spec()).await.unwrap();
        session
            .inject_message(&serde_json::json!({"hello": "world"}))
            .await
            .unwrap();
        let frame = session.recv_frame(2_000).await.unwrap();
        assert_eq!(frame["hello"], "world");
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn closed_session_rejects_injection() {
        let session = CliSession::spawn(echo_spec()).await.unwrap();
        session.close().await.unwrap();
        let err = session
            .inject_message(&serde_json::json!({"x": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Closed(_)));
    }
}
