use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::{Result, ToolError};
use crate::manifest;
use crate::types::ToolManifest;

pub const MANIFEST_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_OUTPUT_CAP_BYTES: usize = 1024 * 1024;
pub const DEFAULT_CONCURRENCY: usize = 10;

const STDERR_TAIL_CAP: usize = 4096;
const SIGTERM_GRACE: Duration = Duration::from_secs(1);

struct CachedManifest {
    manifest: ToolManifest,
    loaded_at: Instant,
}

/// Loads per-tenant tool manifests and executes named tools as subprocesses
/// under a wall-clock timeout, output cap, and process-wide concurrency cap.
pub struct ToolRuntime {
    cache: DashMap<String, CachedManifest>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    output_cap_bytes: usize,
    manifest_cache_ttl: Duration,
}

impl ToolRuntime {
    pub fn new(timeout_ms: u64, concurrency: usize, output_cap_bytes: usize, manifest_cache_ttl_secs: u64) -> Self {
        Self {
            cache: DashMap::new(),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            timeout: Duration::from_millis(timeout_ms),
            output_cap_bytes,
            manifest_cache_ttl: Duration::from_secs(manifest_cache_ttl_secs),
        }
    }

    fn manifest_for(&self, tenant_id: &str, tools_dir: &Path) -> Result<ToolManifest> {
        if let Some(cached) = self.cache.get(tenant_id) {
            if cached.loaded_at.elapsed() < self.manifest_cache_ttl {
                return Ok(cached.manifest.clone());
            }
        }
        let manifest = manifest::load(tenant_id, tools_dir)?;
        self.cache.insert(
            tenant_id.to_string(),
            CachedManifest {
                manifest: manifest.clone(),
                loaded_at: Instant::now(),
            },
        );
        Ok(manifest)
    }

    pub async fn execute(
        &self,
        tenant_id: &str,
        tools_dir: &Path,
        tool_name: &str,
        request: &serde_json::Value,
    ) -> Result<String> {
        let manifest = self.manifest_for(tenant_id, tools_dir)?;
        let entry = manifest
            .find(tool_name)
            .ok_or_else(|| ToolError::NotFound {
                name: tool_name.to_string(),
            })?
            .clone();

        let _permit = self
            .semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|_| ToolError::Overloaded)?;

        let script_path = manifest.tools_dir.join(&entry.script);
        let mut cmd = Command::new(&script_path);
        cmd.current_dir(&manifest.tools_dir)
            .envs(&entry.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| ToolError::SpawnFailed(e.to_string()))?;
        let pid = child.id();

        if let Some(mut stdin) = child.stdin.take() {
            let body = serde_json::to_vec(request).unwrap_or_default();
            let _ = stdin.write_all(&body).await;
        }

        let mut stdout = child.stdout.take().expect("stdout piped at spawn");
        let mut stderr = child.stderr.take().expect("stderr piped at spawn");
        let output_cap = self.output_cap_bytes;

        let read_stdout = async move {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 8192];
            loop {
                match stdout.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        buf.extend_from_slice(&chunk[..n]);
                        if buf.len() > output_cap {
                            return Err(());
                        }
                    }
                }
            }
            Ok(buf)
        };

        let read_stderr = async move {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                match stderr.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        buf.extend_from_slice(&chunk[..n]);
                        if buf.len() > STDERR_TAIL_CAP {
                            let excess = buf.len() - STDERR_TAIL_CAP;
                            buf.drain(..excess);
                        }
                    }
                }
            }
            buf
        };

        let exec = async {
            let (stdout_res, stderr_buf) = tokio::join!(read_stdout, read_stderr);
            let status = child.wait().await;
            (stdout_res, stderr_buf, status)
        };

        match tokio::time::timeout(self.timeout, exec).await {
            Ok((Err(()), _stderr_buf, _status)) => {
                kill_pid(pid).await;
                Err(ToolError::OutputTooLarge)
            }
            Ok((Ok(stdout_buf), stderr_buf, status)) => {
                let status = status?;
                let exit_code = status.code().unwrap_or(-1);
                if exit_code != 0 {
                    warn!(tenant_id, tool = tool_name, exit_code, "tool exited non-zero");
                    Err(ToolError::ToolExit {
                        code: exit_code,
                        stderr_tail: String::from_utf8_lossy(&stderr_buf).into_owned(),
                    })
                } else {
                    info!(tenant_id, tool = tool_name, "tool completed");
                    Ok(String::from_utf8_lossy(&stdout_buf).trim().to_string())
                }
            }
            Err(_elapsed) => {
                kill_pid(pid).await;
                Err(ToolError::Timeout {
                    ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }
}

/// Escalate SIGTERM to SIGKILL after a 1 s grace period, following the same
/// raw `kill(2)` pattern used for one-shot command timeouts elsewhere in the
/// corpus (no owned `Child` handle is held across the grace sleep).
async fn kill_pid(pid: Option<u32>) {
    let Some(pid) = pid else { return };

    #[cfg(unix)]
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
    #[cfg(not(unix))]
    {
        let _ = std::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string()])
            .output();
    }

    tokio::time::sleep(SIGTERM_GRACE).await;

    #[cfg(unix)]
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGKILL);
    }
    #[cfg(not(unix))]
    {
        let _ = std::process::Command::new("taskkill")
            .args(["/F", "/PID", &pid.to_string()])
            .output();
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    fn write_script(dir: &Path, name: &str, body: &str) {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
    }

    fn write_manifest(dir: &Path, entries_json: &str) {
        fs::write(dir.join("manifest.json"), entries_json).unwrap();
    }

    #[tokio::test]
    async fn executes_a_tool_and_returns_trimmed_stdout() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "echo_tool.sh", "#!/bin/sh\ncat > /dev/null\necho hello\n");
        write_manifest(
            dir.path(),
            r#"[{"name":"echo_tool","description":"d","script":"echo_tool.sh","input_schema":{}}]"#,
        );

        let runtime = ToolRuntime::new(DEFAULT_TIMEOUT_MS, DEFAULT_CONCURRENCY, DEFAULT_OUTPUT_CAP_BYTES, MANIFEST_CACHE_TTL_SECS);
        let result = runtime
            .execute("tenant-1", dir.path(), "echo_tool", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result, "hello");
    }

    #[tokio::test]
    async fn unknown_tool_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "[]");

        let runtime = ToolRuntime::new(DEFAULT_TIMEOUT_MS, DEFAULT_CONCURRENCY, DEFAULT_OUTPUT_CAP_BYTES, MANIFEST_CACHE_TTL_SECS);
        let err = runtime
            .execute("tenant-1", dir.path(), "missing", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_stderr_tail() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "fail.sh", "#!/bin/sh\ncat > /dev/null\necho boom 1>&2\nexit 3\n");
        write_manifest(
            dir.path(),
            r#"[{"name":"fail","description":"d","script":"fail.sh","input_schema":{}}]"#,
        );

        let runtime = ToolRuntime::new(DEFAULT_TIMEOUT_MS, DEFAULT_CONCURRENCY, DEFAULT_OUTPUT_CAP_BYTES, MANIFEST_CACHE_TTL_SECS);
        let err = runtime
            .execute("tenant-1", dir.path(), "fail", &serde_json::json!({}))
            .await
            .unwrap_err();
        match err {
            ToolError::ToolExit { code, stderr_tail } => {
                assert_eq!(code, 3);
                assert!(stderr_tail.contains("boom"));
            }
            other => panic!("expected ToolExit, got {other:?}"),
        }
    }
}
