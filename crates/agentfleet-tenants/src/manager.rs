use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{info, instrument};
use uuid::Uuid;

use agentfleet_core::ChannelKind;

use crate::error::{Result, TenantError};
use crate::types::{Tenant, TenantCredential, TenantStatus};
use crate::{bootstrap, crypto, db};

/// Owns tenant records, their encrypted credentials, and their filesystem
/// bootstrap. One instance is shared process-wide.
pub struct TenantManager {
    conn: Arc<Mutex<Connection>>,
    root_dir: PathBuf,
    encryption_key: Option<[u8; 32]>,
    /// Tenant ids whose filesystem bootstrap has already run this process —
    /// avoids re-touching the filesystem on every message.
    bootstrapped: Mutex<HashSet<String>>,
}

impl TenantManager {
    pub fn new(conn: Arc<Mutex<Connection>>, root_dir: impl Into<PathBuf>, encryption_key_b64: Option<&str>) -> Result<Self> {
        let encryption_key = encryption_key_b64.map(crypto::decode_key).transpose()?;
        Ok(Self {
            conn,
            root_dir: root_dir.into(),
            encryption_key,
            bootstrapped: Mutex::new(HashSet::new()),
        })
    }

    #[instrument(skip(self), fields(tenant_id))]
    pub fn create_tenant(
        &self,
        display_name: &str,
        channel: ChannelKind,
        recipient_id: &str,
    ) -> Result<Tenant> {
        let now = Utc::now().to_rfc3339();
        let tenant = Tenant {
            id: Uuid::now_v7().to_string(),
            display_name: display_name.to_string(),
            channel,
            recipient_id: recipient_id.to_string(),
            status: TenantStatus::Active,
            onboarding_phase: String::new(),
            created_at: now.clone(),
            updated_at: now,
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tenants (id, display_name, channel, recipient_id, status, onboarding_phase, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                tenant.id,
                tenant.display_name,
                tenant.channel.to_string(),
                tenant.recipient_id,
                tenant.status.to_string(),
                tenant.onboarding_phase,
                tenant.created_at,
                tenant.updated_at,
            ],
        )?;
        drop(conn);

        self.ensure_bootstrap(&tenant.id)?;
        info!(tenant_id = %tenant.id, "tenant created");
        Ok(tenant)
    }

    pub fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(TENANT_SELECT_SQL)?;
        match stmt.query_row(params![tenant_id], db::row_to_tenant) {
            Ok(t) => Ok(Some(t)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TenantError::Database(e)),
        }
    }

    /// Cross-channel lookup used on every inbound message: resolve a
    /// `(channel, recipient_id)` pair to the owning tenant.
    pub fn find_by_recipient(&self, channel: ChannelKind, recipient_id: &str) -> Result<Option<Tenant>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{TENANT_SELECT_SQL_BASE} WHERE channel = ?1 AND recipient_id = ?2"
        ))?;
        match stmt.query_row(params![channel.to_string(), recipient_id], db::row_to_tenant) {
            Ok(t) => Ok(Some(t)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TenantError::Database(e)),
        }
    }

    pub fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{TENANT_SELECT_SQL_BASE} ORDER BY created_at ASC"))?;
        let rows = stmt
            .query_map([], db::row_to_tenant)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn set_status(&self, tenant_id: &str, status: TenantStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE tenants SET status=?2, updated_at=?3 WHERE id=?1",
            params![tenant_id, status.to_string(), Utc::now().to_rfc3339()],
        )?;
        if rows == 0 {
            return Err(TenantError::NotFound(tenant_id.to_string()));
        }
        Ok(())
    }

    pub fn set_onboarding_phase(&self, tenant_id: &str, phase: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE tenants SET onboarding_phase=?2, updated_at=?3 WHERE id=?1",
            params![tenant_id, phase, Utc::now().to_rfc3339()],
        )?;
        if rows == 0 {
            return Err(TenantError::NotFound(tenant_id.to_string()));
        }
        Ok(())
    }

    /// Idempotent, cached per process: ensure `tenants/<id>/` exists on disk.
    pub fn ensure_bootstrap(&self, tenant_id: &str) -> Result<()> {
        {
            let seen = self.bootstrapped.lock().unwrap();
            if seen.contains(tenant_id) {
                return Ok(());
            }
        }
        bootstrap::ensure(&self.root_dir, tenant_id)?;
        self.bootstrapped.lock().unwrap().insert(tenant_id.to_string());
        Ok(())
    }

    pub fn tenant_dir(&self, tenant_id: &str) -> PathBuf {
        bootstrap::tenant_dir(&self.root_dir, tenant_id)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Encrypt and upsert a credential for `tenant_id`.
    pub fn set_credential(&self, tenant_id: &str, service_name: &str, plaintext: &str) -> Result<()> {
        let key = self.encryption_key.ok_or(TenantError::MissingEncryptionKey)?;
        let encrypted = crypto::encrypt(plaintext, &key)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tenant_credentials (tenant_id, service_name, encrypted_value, updated_at)
             VALUES (?1,?2,?3,?4)
             ON CONFLICT(tenant_id, service_name) DO UPDATE SET
                encrypted_value = excluded.encrypted_value,
                updated_at = excluded.updated_at",
            params![tenant_id, service_name, encrypted, now],
        )?;
        Ok(())
    }

    /// Decrypt a credential. Only the Tenant Tool Runtime should call this,
    /// immediately before injecting the value into a subprocess environment.
    pub fn get_credential(&self, tenant_id: &str, service_name: &str) -> Result<String> {
        let key = self.encryption_key.ok_or(TenantError::MissingEncryptionKey)?;
        let row = self.get_credential_row(tenant_id, service_name)?;
        crypto::decrypt(&row.encrypted_value, &key)
    }

    pub fn get_credential_row(&self, tenant_id: &str, service_name: &str) -> Result<TenantCredential> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT tenant_id, service_name, encrypted_value, updated_at
             FROM tenant_credentials WHERE tenant_id=?1 AND service_name=?2",
        )?;
        match stmt.query_row(params![tenant_id, service_name], db::row_to_credential) {
            Ok(c) => Ok(c),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(TenantError::CredentialNotFound {
                tenant_id: tenant_id.to_string(),
                service_name: service_name.to_string(),
            }),
            Err(e) => Err(TenantError::Database(e)),
        }
    }

    pub fn list_credentials(&self, tenant_id: &str) -> Result<Vec<TenantCredential>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT tenant_id, service_name, encrypted_value, updated_at
             FROM tenant_credentials WHERE tenant_id=?1 ORDER BY service_name ASC",
        )?;
        let rows = stmt
            .query_map(params![tenant_id], db::row_to_credential)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

const TENANT_SELECT_SQL_BASE: &str =
    "SELECT id, display_name, channel, recipient_id, status, onboarding_phase, created_at, updated_at FROM tenants";

const TENANT_SELECT_SQL: &str =
    "SELECT id, display_name, channel, recipient_id, status, onboarding_phase, created_at, updated_at FROM tenants WHERE id = ?1";

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (TenantManager, tempfile::TempDir) {
        let conn = Connection::open_in_memory().unwrap();
        db::init_db(&conn).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let key = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, [0x9u8; 32]);
        let mgr = TenantManager::new(Arc::new(Mutex::new(conn)), dir.path(), Some(&key)).unwrap();
        (mgr, dir)
    }

    #[test]
    fn create_and_fetch_tenant_bootstraps_filesystem() {
        let (mgr, dir) = manager();
        let tenant = mgr.create_tenant("Acme", ChannelKind::Whatsapp, "+15551234567").unwrap();

        let fetched = mgr.get_tenant(&tenant.id).unwrap().unwrap();
        assert_eq!(fetched.display_name, "Acme");
        assert_eq!(fetched.status, TenantStatus::Active);

        let root = dir.path().join(&tenant.id);
        assert!(root.join("settings.json").is_file());
    }

    #[test]
    fn find_by_recipient_resolves_tenant() {
        let (mgr, _dir) = manager();
        let tenant = mgr.create_tenant("Acme", ChannelKind::Telegram, "12345").unwrap();

        let found = mgr.find_by_recipient(ChannelKind::Telegram, "12345").unwrap().unwrap();
        assert_eq!(found.id, tenant.id);
    }

    #[test]
    fn credential_roundtrip_is_encrypted_at_rest() {
        let (mgr, _dir) = manager();
        let tenant = mgr.create_tenant("Acme", ChannelKind::Whatsapp, "+1").unwrap();

        mgr.set_credential(&tenant.id, "openai", "sk-secret").unwrap();
        let row = mgr.get_credential_row(&tenant.id, "openai").unwrap();
        assert_ne!(row.encrypted_value, "sk-secret");
        assert!(row.encrypted_value.starts_with("enc:"));

        let decrypted = mgr.get_credential(&tenant.id, "openai").unwrap();
        assert_eq!(decrypted, "sk-secret");
    }

    #[test]
    fn missing_credential_is_an_error() {
        let (mgr, _dir) = manager();
        let tenant = mgr.create_tenant("Acme", ChannelKind::Whatsapp, "+1").unwrap();
        assert!(mgr.get_credential(&tenant.id, "missing").is_err());
    }
}
