use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`: the `scheduled_tasks` table,
/// its polling index, and the single-row `scheduler_lock` table that
/// emulates a fleet-wide advisory lock (SQLite has no native one).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS scheduled_tasks (
            id                TEXT    NOT NULL PRIMARY KEY,
            tenant_id         TEXT    NOT NULL,
            user_id           TEXT    NOT NULL,
            task_prompt       TEXT    NOT NULL,
            task_type         TEXT    NOT NULL,
            is_one_time       INTEGER NOT NULL,
            cron_expr         TEXT,
            run_at            TEXT,
            timezone          TEXT    NOT NULL DEFAULT 'UTC',
            next_run_at       TEXT    NOT NULL,
            enabled           INTEGER NOT NULL DEFAULT 1,
            error_count       INTEGER NOT NULL DEFAULT 0,
            last_error        TEXT,
            lease_owner       TEXT,
            lease_expires_at  TEXT,
            previous_outputs  TEXT    NOT NULL DEFAULT '[]',
            created_at        TEXT    NOT NULL,
            updated_at        TEXT    NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_scheduled_tasks_due
            ON scheduled_tasks(enabled, next_run_at);

        CREATE TABLE IF NOT EXISTS scheduler_lock (
            id          INTEGER PRIMARY KEY CHECK (id = 1),
            holder      TEXT,
            expires_at  TEXT
        );
        INSERT OR IGNORE INTO scheduler_lock (id, holder, expires_at) VALUES (1, NULL, NULL);
        ",
    )?;
    Ok(())
}
