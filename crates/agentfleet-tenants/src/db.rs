use rusqlite::{Connection, Result};

use crate::types::{Tenant, TenantCredential, TenantStatus};

pub(crate) fn row_to_tenant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tenant> {
    use std::str::FromStr;
    let channel: String = row.get(2)?;
    let status: String = row.get(4)?;
    Ok(Tenant {
        id: row.get(0)?,
        display_name: row.get(1)?,
        channel: agentfleet_core::ChannelKind::from_str(&channel)
            .unwrap_or(agentfleet_core::ChannelKind::Whatsapp),
        recipient_id: row.get(3)?,
        status: TenantStatus::from_str(&status).unwrap_or_default(),
        onboarding_phase: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub(crate) fn row_to_credential(row: &rusqlite::Row<'_>) -> rusqlite::Result<TenantCredential> {
    Ok(TenantCredential {
        tenant_id: row.get(0)?,
        service_name: row.get(1)?,
        encrypted_value: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

/// Initialise all tables owned by this crate. Idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_tenants_table(conn)?;
    create_credentials_table(conn)?;
    Ok(())
}

fn create_tenants_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tenants (
            id               TEXT PRIMARY KEY NOT NULL,
            display_name     TEXT NOT NULL,
            channel          TEXT NOT NULL,
            recipient_id     TEXT NOT NULL,
            status           TEXT NOT NULL DEFAULT 'active',
            onboarding_phase TEXT NOT NULL DEFAULT '',
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tenants_channel_recipient
            ON tenants (channel, recipient_id);",
    )
}

fn create_credentials_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tenant_credentials (
            tenant_id       TEXT NOT NULL REFERENCES tenants(id),
            service_name    TEXT NOT NULL,
            encrypted_value TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            PRIMARY KEY (tenant_id, service_name)
        );",
    )
}
