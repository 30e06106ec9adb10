use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use dashmap::DashMap;
use headless_chrome::{Browser, LaunchOptions};
use rusqlite::{params, Connection};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{BrowserError, Result};
use crate::types::{BrowserLimits, BrowserSessionRow};

/// A live browser handle. Holds the `headless_chrome::Browser` (and thus the
/// Chrome subprocess) plus a tab kept open for health probing and real work.
pub struct BrowserHandle {
    pub id: String,
    pub tenant_id: String,
    pub persistent: bool,
    pub browser: Arc<Browser>,
    created_at_epoch: i64,
    last_used_epoch: AtomicI64,
}

impl BrowserHandle {
    fn touch(&self) {
        self.last_used_epoch.store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    fn idle_secs(&self) -> i64 {
        Utc::now().timestamp() - self.last_used_epoch.load(Ordering::Relaxed)
    }

    fn age_secs(&self) -> i64 {
        Utc::now().timestamp() - self.created_at_epoch
    }
}

/// Bounded, per-tenant pool of headless browser contexts. Mirrors the
/// teacher's single-process-map-keyed-by-id shape, generalized to multiple
/// sessions per tenant with idle and persistent lifetimes.
pub struct BrowserPool {
    conn: StdMutex<Connection>,
    owner: String,
    base_dir: PathBuf,
    limits: BrowserLimits,
    handles: DashMap<String, Arc<BrowserHandle>>,
}

impl BrowserPool {
    pub fn new(conn: Connection, owner: String, base_dir: PathBuf, limits: BrowserLimits) -> Result<Arc<Self>> {
        init_db(&conn)?;
        Ok(Arc::new(Self {
            conn: StdMutex::new(conn),
            owner,
            base_dir,
            limits,
            handles: DashMap::new(),
        }))
    }

    fn profile_dir(&self, tenant_id: &str, session_id: &str) -> PathBuf {
        self.base_dir
            .join("tenants")
            .join(tenant_id)
            .join("browser-profile")
            .join(session_id)
    }

    /// Evaluate a constant no-op expression through the handle's own tab,
    /// the same liveness check the source enrichment repo performs before
    /// reusing a cached browser.
    fn probe(browser: &Browser) -> Result<()> {
        let tab = browser
            .new_tab()
            .map_err(|e| BrowserError::HealthCheckFailed(e.to_string()))?;
        tab.evaluate("1", false)
            .map(|_| ())
            .map_err(|e| BrowserError::HealthCheckFailed(e.to_string()))
    }

    pub async fn get_or_create(
        &self,
        tenant_id: &str,
        session_id: Option<&str>,
        persistent: bool,
    ) -> Result<Arc<BrowserHandle>> {
        if let Some(id) = session_id {
            if let Some(entry) = self.handles.get(id) {
                let handle = Arc::clone(entry.value());
                drop(entry);
                if Self::probe(&handle.browser).is_ok() {
                    handle.touch();
                    self.touch_row(id)?;
                    return Ok(handle);
                }
                warn!(session_id = id, "browser handle unhealthy, relaunching");
                self.handles.remove(id);
                self.delete_row(id)?;
            }
        }

        let count = self.count_tenant_sessions(tenant_id)?;
        if count >= self.limits.max_per_tenant {
            match self.oldest_non_persistent(tenant_id)? {
                Some(oldest_id) => self.close_session(&oldest_id).await,
                None => {
                    return Err(BrowserError::SessionLimit {
                        tenant_id: tenant_id.to_string(),
                    })
                }
            }
        }

        let id = session_id
            .map(|s| s.to_string())
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        self.spawn(tenant_id, &id, persistent)
    }

    fn spawn(&self, tenant_id: &str, session_id: &str, persistent: bool) -> Result<Arc<BrowserHandle>> {
        let profile_dir = self.profile_dir(tenant_id, session_id);
        std::fs::create_dir_all(&profile_dir)?;

        info!(tenant_id, session_id, path = %profile_dir.display(), "launching browser");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .idle_browser_timeout(self.limits.idle_ttl)
            .user_data_dir(Some(profile_dir))
            .build()
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let browser = Browser::new(options).map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let now = Utc::now();
        let expires_at = if persistent {
            now + chrono::Duration::from_std(self.limits.persist_ttl).unwrap()
        } else {
            now + chrono::Duration::from_std(self.limits.idle_ttl).unwrap()
        };

        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO browser_sessions (id, tenant_id, persistent, owner, created_at, last_used_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    session_id,
                    tenant_id,
                    persistent as i64,
                    self.owner,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                    expires_at.to_rfc3339(),
                ],
            )?;
        }

        let handle = Arc::new(BrowserHandle {
            id: session_id.to_string(),
            tenant_id: tenant_id.to_string(),
            persistent,
            browser: Arc::new(browser),
            created_at_epoch: now.timestamp(),
            last_used_epoch: AtomicI64::new(now.timestamp()),
        });
        self.handles.insert(session_id.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    pub async fn close_session(&self, session_id: &str) {
        self.handles.remove(session_id);
        let _ = self.delete_row(session_id);
        info!(session_id, "browser session closed");
    }

    /// Close every local handle and drop rows this instance owns. Called on
    /// process shutdown.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.handles.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.handles.remove(&id);
        }
        let conn = self.conn.lock().unwrap();
        let _ = conn.execute(
            "DELETE FROM browser_sessions WHERE owner = ?1",
            params![self.owner],
        );
        info!("browser pool shut down");
    }

    /// One sweep: evict idle non-persistent handles, expired persistent
    /// handles, and reclaim orphaned or lost-handle persistence rows.
    pub async fn sweep(&self) -> Result<()> {
        let idle_limit = self.limits.idle_ttl.as_secs() as i64;
        let persist_limit = self.limits.persist_ttl.as_secs() as i64;

        let stale: Vec<String> = self
            .handles
            .iter()
            .filter(|e| {
                let h = e.value();
                if h.persistent {
                    h.age_secs() > persist_limit
                } else {
                    h.idle_secs() > idle_limit
                }
            })
            .map(|e| e.key().clone())
            .collect();
        for id in stale {
            self.close_session(&id).await;
        }

        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        // Orphan reclamation: expired lease, no local handle anywhere (may be
        // owned by a dead instance).
        let mut stmt = conn.prepare(
            "SELECT id FROM browser_sessions WHERE expires_at < ?1",
        )?;
        let orphan_ids: Vec<String> = stmt
            .query_map(params![now], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .filter(|id| !self.handles.contains_key(id))
            .collect();
        drop(stmt);
        for id in &orphan_ids {
            conn.execute("DELETE FROM browser_sessions WHERE id = ?1", params![id])?;
        }

        // Lost-handle reclamation: rows we own but whose handle vanished
        // (e.g. process crash recovery within the same instance's lifetime).
        let mut stmt = conn.prepare("SELECT id FROM browser_sessions WHERE owner = ?1")?;
        let owned_ids: Vec<String> = stmt
            .query_map(params![self.owner], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .filter(|id| !self.handles.contains_key(id))
            .collect();
        drop(stmt);
        for id in &owned_ids {
            conn.execute("DELETE FROM browser_sessions WHERE id = ?1", params![id])?;
        }

        Ok(())
    }

    fn touch_row(&self, session_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE browser_sessions SET last_used_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), session_id],
        )?;
        Ok(())
    }

    fn delete_row(&self, session_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM browser_sessions WHERE id = ?1", params![session_id])?;
        Ok(())
    }

    fn count_tenant_sessions(&self, tenant_id: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM browser_sessions WHERE tenant_id = ?1",
            params![tenant_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn oldest_non_persistent(&self, tenant_id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<BrowserSessionRow> = conn
            .query_row(
                "SELECT id, tenant_id, persistent, owner, created_at, last_used_at, expires_at
                 FROM browser_sessions
                 WHERE tenant_id = ?1 AND persistent = 0
                 ORDER BY last_used_at ASC LIMIT 1",
                params![tenant_id],
                |row| {
                    Ok(BrowserSessionRow {
                        id: row.get(0)?,
                        tenant_id: row.get(1)?,
                        persistent: row.get::<_, i64>(2)? != 0,
                        owner: row.get(3)?,
                        created_at: row.get(4)?,
                        last_used_at: row.get(5)?,
                        expires_at: row.get(6)?,
                    })
                },
            )
            .ok();
        Ok(row.map(|r| r.id))
    }
}
