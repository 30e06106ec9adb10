use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use dashmap::DashMap;
use rusqlite::Connection;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::adapter::TriggerAdapter;
use crate::db::init_db;
use crate::error::Result;
use crate::types::TriggerEvent;
use crate::webhook::WebhookAdapter;

/// Concurrent map of active adapters keyed by trigger id, mirroring the
/// shape of the channel manager's transport registry. Owns cooldown
/// bookkeeping so every adapter kind enforces firing rules identically.
pub struct TriggerRegistry {
    conn: StdMutex<Connection>,
    adapters: DashMap<String, Arc<dyn TriggerAdapter>>,
}

impl TriggerRegistry {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: StdMutex::new(conn),
            adapters: DashMap::new(),
        })
    }

    pub fn register(&self, adapter: Arc<dyn TriggerAdapter>) {
        self.adapters.insert(adapter.trigger_id().to_string(), adapter);
    }

    pub fn unregister(&self, trigger_id: &str) {
        self.adapters.remove(trigger_id);
    }

    /// Start every registered adapter's loop, forwarding accepted events
    /// (past cooldown) onto `out`.
    pub fn start_all(self: &Arc<Self>, out: mpsc::UnboundedSender<TriggerEvent>) {
        for entry in self.adapters.iter() {
            let adapter = Arc::clone(entry.value());
            let registry = Arc::clone(self);
            let out = out.clone();
            tokio::spawn(async move {
                let (tx, mut rx) = mpsc::unbounded_channel();
                let adapter_for_loop = Arc::clone(&adapter);
                let run = tokio::spawn(async move { adapter_for_loop.start(tx).await });
                while let Some(event) = rx.recv().await {
                    if registry.accept(&event) {
                        if out.send(event).is_err() {
                            break;
                        }
                    }
                }
                let _ = run.await;
            });
        }
        info!(count = self.adapters.len(), "trigger adapters started");
    }

    pub async fn stop_all(&self) {
        for entry in self.adapters.iter() {
            entry.value().stop().await;
        }
        info!("trigger adapters stopped");
    }

    /// Inject a synchronous webhook event, applying the same cooldown gate
    /// as polling adapters.
    pub fn handle_webhook(&self, trigger_id: &str, payload: serde_json::Value) -> Option<TriggerEvent> {
        let adapter = self.adapters.get(trigger_id)?;
        let webhook = adapter.value().as_any().downcast_ref::<WebhookAdapter>()?;
        let event = webhook.event_from_payload(payload);
        if self.accept(&event) {
            Some(event)
        } else {
            None
        }
    }

    /// Apply cooldown and stamp `last_triggered_at` / advance `next_check_at`.
    fn accept(&self, event: &TriggerEvent) -> bool {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let row: Option<(Option<String>, i64, i64)> = conn
            .query_row(
                "SELECT last_triggered_at, cooldown_secs, interval_secs FROM triggers WHERE id = ?1",
                [&event.trigger_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .ok();

        let Some((last_triggered_at, cooldown_secs, interval_secs)) = row else {
            warn!(trigger_id = %event.trigger_id, "accept check against unknown trigger");
            return true;
        };

        if let Some(last) = last_triggered_at {
            if let Ok(last_dt) = chrono::DateTime::parse_from_rfc3339(&last) {
                let cooldown_until = last_dt.with_timezone(&Utc) + chrono::Duration::seconds(cooldown_secs);
                if now < cooldown_until {
                    return false;
                }
            }
        }

        let next_check = now + chrono::Duration::seconds(interval_secs.max(1));
        let _ = conn.execute(
            "UPDATE triggers SET last_triggered_at = ?1, next_check_at = ?2 WHERE id = ?3",
            rusqlite::params![now.to_rfc3339(), next_check.to_rfc3339(), event.trigger_id],
        );
        true
    }
}
