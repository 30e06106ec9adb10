use rusqlite::Connection;

use crate::error::Result;

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS triggers (
            id                TEXT    NOT NULL PRIMARY KEY,
            tenant_id         TEXT    NOT NULL,
            user_id           TEXT    NOT NULL,
            kind              TEXT    NOT NULL,
            task_prompt       TEXT    NOT NULL,
            config            TEXT    NOT NULL DEFAULT '{}',
            cooldown_secs     INTEGER NOT NULL DEFAULT 0,
            interval_secs     INTEGER NOT NULL DEFAULT 300,
            enabled           INTEGER NOT NULL DEFAULT 1,
            last_triggered_at TEXT,
            next_check_at     TEXT,
            created_at        TEXT    NOT NULL,
            updated_at        TEXT    NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_triggers_tenant ON triggers(tenant_id);",
    )?;
    Ok(())
}
