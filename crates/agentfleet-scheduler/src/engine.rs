use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rusqlite::Connection;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, SchedulerError};
use crate::lock;
use crate::schedule::compute_next_run;
use crate::types::ScheduledTask;

/// Auto-disable threshold: a task stops being claimed once its
/// `error_count` reaches this many consecutive failures.
pub const MAX_ERROR_COUNT: u32 = 3;

/// Dispatches a due task's prompt through the agent runtime and returns the
/// text to deliver back to the tenant. Implemented outside this crate to
/// avoid a dependency cycle between the scheduler and the agent glue.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &ScheduledTask) -> std::result::Result<String, String>;
}

/// Core scheduler: persists tasks to SQLite and drives execution under a
/// fleet-wide advisory lock so at most one instance runs a given cycle.
pub struct SchedulerEngine {
    conn: Mutex<Connection>,
    owner: String,
    executor: Arc<dyn TaskExecutor>,
    batch_size: usize,
    lease_ttl: Duration,
    tick_interval: std::time::Duration,
}

impl SchedulerEngine {
    pub fn new(
        conn: Connection,
        owner: String,
        executor: Arc<dyn TaskExecutor>,
        batch_size: usize,
        lease_ttl_secs: i64,
        tick_secs: u64,
    ) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            owner,
            executor,
            batch_size,
            lease_ttl: Duration::seconds(lease_ttl_secs),
            tick_interval: std::time::Duration::from_secs(tick_secs),
        })
    }

    pub fn add_task(&self, task: &ScheduledTask) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let outputs = serde_json::to_string(&task.previous_outputs).unwrap_or_else(|_| "[]".into());
        conn.execute(
            "INSERT INTO scheduled_tasks
             (id, tenant_id, user_id, task_prompt, task_type, is_one_time, cron_expr, run_at,
              timezone, next_run_at, enabled, error_count, last_error, lease_owner,
              lease_expires_at, previous_outputs, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?17)",
            rusqlite::params![
                task.id,
                task.tenant_id,
                task.user_id,
                task.task_prompt,
                task.task_type.to_string(),
                task.is_one_time as i64,
                task.cron_expr,
                task.run_at,
                task.timezone,
                task.next_run_at,
                task.enabled as i64,
                task.error_count,
                task.last_error,
                task.lease_owner,
                task.lease_expires_at,
                outputs,
                task.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn remove_task(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM scheduled_tasks WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(SchedulerError::TaskNotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Main event loop. Ticks at `tick_interval` until `shutdown` broadcasts `true`.
    /// Waits for an in-flight cycle to finish (bounded grace window) before exiting.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler engine started");
        let mut interval = tokio::time::interval(self.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let this = Arc::clone(&self);
                    let grace = std::time::Duration::from_secs(60);
                    if tokio::time::timeout(grace, this.run_cycle()).await.is_err() {
                        warn!("scheduler cycle exceeded grace window and was abandoned");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Attempt to claim the advisory lock; if successful, execute one cycle
    /// of due tasks, then release the lock.
    async fn run_cycle(&self) {
        let claimed = {
            let conn = self.conn.lock().unwrap();
            lock::try_claim(&conn, &self.owner, self.lease_ttl)
        };
        match claimed {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                error!("advisory lock claim failed: {e}");
                return;
            }
        }

        if let Err(e) = self.execute_due().await {
            error!("scheduler cycle error: {e}");
        }

        let conn = self.conn.lock().unwrap();
        if let Err(e) = lock::release(&conn, &self.owner) {
            error!("failed to release advisory lock: {e}");
        }
    }

    /// Claim and execute up to `batch_size` due tasks.
    async fn execute_due(&self) -> Result<()> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let expires_at = (now + self.lease_ttl).to_rfc3339();

        let claimed_ids: Vec<String> = {
            let conn = self.conn.lock().unwrap();
            let ids: Vec<String> = {
                let mut stmt = conn.prepare(
                    "SELECT id FROM scheduled_tasks
                     WHERE enabled = 1 AND next_run_at <= ?1
                       AND (lease_expires_at IS NULL OR lease_expires_at < ?1)
                     ORDER BY next_run_at ASC LIMIT ?2",
                )?;
                stmt.query_map(rusqlite::params![now_str, self.batch_size as i64], |row| {
                    row.get::<_, String>(0)
                })?
                .filter_map(|r| r.ok())
                .collect()
            };
            for id in &ids {
                conn.execute(
                    "UPDATE scheduled_tasks SET lease_owner = ?1, lease_expires_at = ?2 WHERE id = ?3",
                    rusqlite::params![self.owner, expires_at, id],
                )?;
            }
            ids
        };

        for id in claimed_ids {
            if let Some(task) = self.load_task(&id)? {
                self.execute_one(task).await;
            }
        }
        Ok(())
    }

    fn load_task(&self, id: &str) -> Result<Option<ScheduledTask>> {
        let conn = self.conn.lock().unwrap();
        match conn.query_row(
            "SELECT id, tenant_id, user_id, task_prompt, task_type, is_one_time, cron_expr, run_at,
                    timezone, next_run_at, enabled, error_count, last_error, lease_owner,
                    lease_expires_at, previous_outputs, created_at, updated_at
             FROM scheduled_tasks WHERE id = ?1",
            [id],
            row_to_task,
        ) {
            Ok(t) => Ok(Some(t)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SchedulerError::Database(e)),
        }
    }

    async fn execute_one(&self, mut task: ScheduledTask) {
        let now = Utc::now();
        match self.executor.execute(&task).await {
            Ok(output) => {
                info!(task_id = %task.id, "scheduled task executed");
                let next = if task.is_one_time {
                    None
                } else {
                    compute_next_run(&task, now).ok().flatten()
                };
                task.push_output(output);

                let conn = self.conn.lock().unwrap();
                if next.is_none() && task.is_one_time {
                    let _ = conn.execute("DELETE FROM scheduled_tasks WHERE id = ?1", [&task.id]);
                } else {
                    let outputs = serde_json::to_string(&task.previous_outputs).unwrap_or_else(|_| "[]".into());
                    let next_str = next.map(|dt| dt.to_rfc3339());
                    let _ = conn.execute(
                        "UPDATE scheduled_tasks
                         SET next_run_at = COALESCE(?1, next_run_at), error_count = 0, last_error = NULL,
                             lease_owner = NULL, lease_expires_at = NULL, previous_outputs = ?2,
                             updated_at = ?3, enabled = CASE WHEN ?1 IS NULL THEN 0 ELSE enabled END
                         WHERE id = ?4",
                        rusqlite::params![next_str, outputs, now.to_rfc3339(), task.id],
                    );
                }
            }
            Err(err) => {
                warn!(task_id = %task.id, error = %err, "scheduled task failed");
                let new_count = task.error_count + 1;
                let disable = new_count >= MAX_ERROR_COUNT;
                let conn = self.conn.lock().unwrap();
                let _ = conn.execute(
                    "UPDATE scheduled_tasks
                     SET error_count = ?1, last_error = ?2, lease_owner = NULL, lease_expires_at = NULL,
                         enabled = CASE WHEN ?3 THEN 0 ELSE enabled END, updated_at = ?4
                     WHERE id = ?5",
                    rusqlite::params![new_count, err, disable, now.to_rfc3339(), task.id],
                );
                if disable {
                    warn!(task_id = %task.id, "task auto-disabled after repeated failures");
                }
            }
        }
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduledTask> {
    let task_type_str: String = row.get(4)?;
    let outputs_json: String = row.get(15)?;
    Ok(ScheduledTask {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        user_id: row.get(2)?,
        task_prompt: row.get(3)?,
        task_type: task_type_str.parse().unwrap_or(crate::types::TaskType::Execute),
        is_one_time: row.get::<_, i64>(5)? != 0,
        cron_expr: row.get(6)?,
        run_at: row.get(7)?,
        timezone: row.get(8)?,
        next_run_at: row.get(9)?,
        enabled: row.get::<_, i64>(10)? != 0,
        error_count: row.get::<_, i64>(11)? as u32,
        last_error: row.get(12)?,
        lease_owner: row.get(13)?,
        lease_expires_at: row.get(14)?,
        previous_outputs: serde_json::from_str(&outputs_json).unwrap_or_default(),
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid as TestUuid;

    struct AlwaysOk;

    #[async_trait]
    impl TaskExecutor for AlwaysOk {
        async fn execute(&self, _task: &ScheduledTask) -> std::result::Result<String, String> {
            Ok("done".to_string())
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl TaskExecutor for AlwaysFails {
        async fn execute(&self, _task: &ScheduledTask) -> std::result::Result<String, String> {
            Err("boom".to_string())
        }
    }

    fn due_task(id: &str) -> ScheduledTask {
        let now = Utc::now();
        ScheduledTask {
            id: id.to_string(),
            tenant_id: "tenant-1".into(),
            user_id: "user-1".into(),
            task_prompt: "ping".into(),
            task_type: crate::types::TaskType::Reminder,
            is_one_time: true,
            cron_expr: None,
            run_at: Some((now - Duration::seconds(1)).to_rfc3339()),
            timezone: "UTC".into(),
            next_run_at: (now - Duration::seconds(1)).to_rfc3339(),
            enabled: true,
            error_count: 0,
            last_error: None,
            lease_owner: None,
            lease_expires_at: None,
            previous_outputs: vec![],
            created_at: now.to_rfc3339(),
            updated_at: now.to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn one_time_task_is_deleted_after_success() {
        let conn = Connection::open_in_memory().unwrap();
        let engine = SchedulerEngine::new(
            conn,
            format!("test-{}", TestUuid::new_v4()),
            Arc::new(AlwaysOk),
            10,
            300,
            1,
        )
        .unwrap();
        engine.add_task(&due_task("t-1")).unwrap();
        engine.execute_due().await.unwrap();
        assert!(engine.load_task("t-1").unwrap().is_none());
    }

    #[tokio::test]
    async fn repeated_failures_auto_disable_task() {
        let conn = Connection::open_in_memory().unwrap();
        let engine = SchedulerEngine::new(
            conn,
            format!("test-{}", TestUuid::new_v4()),
            Arc::new(AlwaysFails),
            10,
            300,
            1,
        )
        .unwrap();
        let mut task = due_task("t-2");
        task.is_one_time = false;
        task.run_at = None;
        task.cron_expr = Some("0 0 9 * * *".to_string());
        engine.add_task(&task).unwrap();

        for _ in 0..MAX_ERROR_COUNT {
            // Re-arm the lease so execute_due claims it again each round.
            {
                let conn = engine.conn.lock().unwrap();
                conn.execute(
                    "UPDATE scheduled_tasks SET lease_owner = NULL, lease_expires_at = NULL,
                     next_run_at = ?1 WHERE id = 't-2'",
                    [Utc::now().to_rfc3339()],
                )
                .unwrap();
            }
            engine.execute_due().await.unwrap();
        }

        let stored = engine.load_task("t-2").unwrap().unwrap();
        assert_eq!(stored.error_count, MAX_ERROR_COUNT);
        assert!(!stored.enabled);
    }
}
