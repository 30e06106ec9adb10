use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;

use crate::error::{Result, SchedulerError};
use crate::types::ScheduledTask;

/// Compute the first strictly-future fire time for `task`, starting after `from`.
///
/// For a one-time task this simply checks whether `run_at` is still ahead of
/// `from` (an elapsed `run_at` is never re-derived — the task is deleted
/// instead, see `engine::execute_due`). For a recurring task, the cron
/// expression is always evaluated against `from` — not the task's stale
/// `next_run_at` — so an arbitrarily long outage collapses into exactly one
/// catch-up fire followed by the next *future* occurrence.
pub fn compute_next_run(task: &ScheduledTask, from: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    if let Some(run_at) = &task.run_at {
        let at = DateTime::parse_from_rfc3339(run_at)
            .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?
            .with_timezone(&Utc);
        return Ok(if at > from { Some(at) } else { None });
    }

    let expr = task
        .cron_expr
        .as_deref()
        .ok_or_else(|| SchedulerError::InvalidSchedule("task has neither cron_expr nor run_at".into()))?;
    let tz: Tz = task
        .timezone
        .parse()
        .map_err(|_| SchedulerError::InvalidSchedule(format!("unknown timezone: {}", task.timezone)))?;

    let schedule = CronSchedule::from_str(expr)
        .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;

    let from_tz = from.with_timezone(&tz);
    Ok(schedule.after(&from_tz).next().map(|dt| dt.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base_task(cron_expr: &str, tz: &str) -> ScheduledTask {
        ScheduledTask {
            id: "t-1".into(),
            tenant_id: "tenant-1".into(),
            user_id: "user-1".into(),
            task_prompt: "check in".into(),
            task_type: crate::types::TaskType::Reminder,
            is_one_time: false,
            cron_expr: Some(cron_expr.to_string()),
            run_at: None,
            timezone: tz.to_string(),
            next_run_at: Utc::now().to_rfc3339(),
            enabled: true,
            error_count: 0,
            last_error: None,
            lease_owner: None,
            lease_expires_at: None,
            previous_outputs: vec![],
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn recurring_missed_fires_collapse_to_one_future_occurrence() {
        // "0 0 9 * * *" — every day at 09:00:00 UTC.
        let task = base_task("0 0 9 * * *", "UTC");
        let now = Utc::now();
        let missed_by_48h = now - Duration::hours(48);
        let next = compute_next_run(&task, missed_by_48h).unwrap().unwrap();
        assert!(next > missed_by_48h);

        // Recomputing from "now" (simulating the post-catch-up tick) always
        // yields a time strictly after now — never a second backlog fire.
        let next_after_catchup = compute_next_run(&task, now).unwrap().unwrap();
        assert!(next_after_catchup > now);
    }

    #[test]
    fn one_time_task_in_the_past_has_no_next_run() {
        let mut task = base_task("0 0 9 * * *", "UTC");
        task.cron_expr = None;
        task.run_at = Some((Utc::now() - Duration::hours(1)).to_rfc3339());
        assert!(compute_next_run(&task, Utc::now()).unwrap().is_none());
    }
}
