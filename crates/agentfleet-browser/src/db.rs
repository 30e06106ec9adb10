use rusqlite::Connection;

use crate::error::Result;

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS browser_sessions (
            id            TEXT    NOT NULL PRIMARY KEY,
            tenant_id     TEXT    NOT NULL,
            persistent    INTEGER NOT NULL DEFAULT 0,
            owner         TEXT    NOT NULL,
            created_at    TEXT    NOT NULL,
            last_used_at  TEXT    NOT NULL,
            expires_at    TEXT    NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_browser_sessions_tenant ON browser_sessions(tenant_id);",
    )?;
    Ok(())
}
