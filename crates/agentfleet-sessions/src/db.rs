use rusqlite::Connection;

use crate::error::Result;

/// Initialise the conversation_sessions table and its indexes.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS conversation_sessions (
            id                TEXT PRIMARY KEY,
            tenant_id         TEXT NOT NULL,
            sender_id         TEXT NOT NULL,
            started_at        TEXT NOT NULL,
            last_activity_at  TEXT NOT NULL,
            ended_at          TEXT,
            lease_owner       TEXT,
            lease_expires_at  TEXT
        );
        -- At most one row with ended_at IS NULL per (tenant_id, sender_id) —
        -- a partial index rather than a plain UNIQUE so a reset/expiry can
        -- end the old row and insert a fresh one instead of reusing it.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_conversation_sessions_active_unique
            ON conversation_sessions(tenant_id, sender_id) WHERE ended_at IS NULL;
        CREATE INDEX IF NOT EXISTS idx_conversation_sessions_activity
            ON conversation_sessions(last_activity_at);

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            tenant_id       TEXT NOT NULL,
            sender_id       TEXT NOT NULL,
            session_id      TEXT NOT NULL,
            external_id     TEXT,
            direction       TEXT NOT NULL,
            content         TEXT NOT NULL,
            delivery_status TEXT NOT NULL DEFAULT 'pending',
            created_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_tenant_sender_created
            ON messages (tenant_id, sender_id, created_at DESC);

        CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
            content, content='messages', content_rowid='rowid'
        );
        CREATE TRIGGER IF NOT EXISTS messages_ai AFTER INSERT ON messages BEGIN
            INSERT INTO messages_fts(rowid, content) VALUES (new.rowid, new.content);
        END;",
    )?;
    Ok(())
}
