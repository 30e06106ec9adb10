use std::sync::Mutex;

use agentfleet_core::{LeaseOwner, SenderId, SessionKey, TenantId};
use chrono::Duration;
use rusqlite::Connection;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::types::{DeliveryStatus, Message, MessageDirection, Session};

/// Thread-safe manager for persisted conversation sessions.
///
/// Wraps a single SQLite connection in a `Mutex`. Every session is keyed by
/// `(tenant_id, sender_id)` and protected by a time-bounded lease so that at
/// most one process is ever driving a given conversation at once.
pub struct SessionManager {
    db: Mutex<Connection>,
}

impl SessionManager {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    /// Return the active session for `(tenant_id, sender_id)` or create one,
    /// claiming the lease for this process. The `bool` is `true` exactly
    /// when a fresh session was created — either because none existed, or
    /// because the previous active session had gone idle past
    /// `idle_hours`, in which case it is first ended rather than reused.
    ///
    /// Fails with [`SessionError::Unavailable`] if another process currently
    /// holds an unexpired lease on the still-active (non-idle) session.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, sender_id = %sender_id))]
    pub fn get_or_create(
        &self,
        tenant_id: &TenantId,
        sender_id: &SenderId,
        lease_ttl_secs: i64,
        idle_hours: i64,
    ) -> Result<(Session, bool)> {
        let now = chrono::Utc::now();
        let owner = LeaseOwner::this_process();
        let expires_at = (now + Duration::seconds(lease_ttl_secs)).to_rfc3339();
        let now_str = now.to_rfc3339();
        let idle_cutoff = (now - Duration::hours(idle_hours)).to_rfc3339();

        let db = self.db.lock().unwrap();

        if let Some(existing) = query_active_session(&db, tenant_id, sender_id)? {
            if existing.last_activity_at.as_str() < idle_cutoff.as_str() {
                db.execute(
                    "UPDATE conversation_sessions
                     SET ended_at = ?1, lease_owner = NULL, lease_expires_at = NULL
                     WHERE id = ?2",
                    rusqlite::params![existing.last_activity_at, existing.id],
                )?;
                debug!(session_id = %existing.id, "idle session ended, starting a fresh one");
            } else {
                if let (Some(holder), Some(holder_expires)) =
                    (&existing.lease_owner, &existing.lease_expires_at)
                {
                    if holder != owner.as_str() && holder_expires.as_str() > now_str.as_str() {
                        return Err(SessionError::Unavailable {
                            key: SessionKey::new(tenant_id, sender_id).to_string(),
                            holder: holder.clone(),
                            expires_at: holder_expires.clone(),
                        });
                    }
                }

                db.execute(
                    "UPDATE conversation_sessions
                     SET lease_owner = ?1, lease_expires_at = ?2
                     WHERE id = ?3",
                    rusqlite::params![owner.as_str(), expires_at, existing.id],
                )?;

                debug!("conversation session lease claimed");
                let session = query_session_by_id(&db, &existing.id)?.ok_or_else(|| {
                    SessionError::NotFound {
                        key: SessionKey::new(tenant_id, sender_id).to_string(),
                    }
                })?;
                return Ok((session, false));
            }
        }

        let id = Uuid::now_v7().to_string();
        db.execute(
            "INSERT INTO conversation_sessions
             (id, tenant_id, sender_id, started_at, last_activity_at, lease_owner, lease_expires_at)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?6)",
            rusqlite::params![
                id,
                tenant_id.as_str(),
                sender_id.as_str(),
                now_str,
                owner.as_str(),
                expires_at
            ],
        )?;

        let session = query_session_by_id(&db, &id)?.ok_or_else(|| SessionError::NotFound {
            key: SessionKey::new(tenant_id, sender_id).to_string(),
        })?;
        Ok((session, true))
    }

    /// Explicitly end a session (e.g. on `/reset`). Clears the lease.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, sender_id = %sender_id))]
    pub fn end(&self, tenant_id: &TenantId, sender_id: &SenderId) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "UPDATE conversation_sessions
             SET ended_at = ?1, lease_owner = NULL, lease_expires_at = NULL
             WHERE tenant_id = ?2 AND sender_id = ?3 AND ended_at IS NULL",
            rusqlite::params![now, tenant_id.as_str(), sender_id.as_str()],
        )?;
        if rows == 0 {
            return Err(SessionError::NotFound {
                key: SessionKey::new(tenant_id, sender_id).to_string(),
            });
        }
        Ok(())
    }

    /// Release the lease without ending the session, so another process can
    /// claim it immediately. Used when this process is shutting down cleanly.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, sender_id = %sender_id))]
    pub fn release_lease(&self, tenant_id: &TenantId, sender_id: &SenderId) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE conversation_sessions
             SET lease_owner = NULL, lease_expires_at = NULL
             WHERE tenant_id = ?1 AND sender_id = ?2 AND lease_owner = ?3 AND ended_at IS NULL",
            rusqlite::params![
                tenant_id.as_str(),
                sender_id.as_str(),
                LeaseOwner::this_process().as_str()
            ],
        )?;
        Ok(())
    }

    /// Insert an immutable inbound message row, recorded as delivered on arrival.
    #[instrument(skip(self, content), fields(tenant_id = %tenant_id, sender_id = %sender_id))]
    pub fn record_inbound(
        &self,
        tenant_id: &TenantId,
        sender_id: &SenderId,
        session_id: &str,
        external_id: Option<&str>,
        content: &str,
    ) -> Result<Message> {
        self.insert_message(
            tenant_id,
            sender_id,
            session_id,
            external_id,
            MessageDirection::Inbound,
            content,
            DeliveryStatus::Delivered,
        )
    }

    /// Insert an immutable outbound message row in `Pending` state. Callers
    /// update the delivery status once the channel transport confirms send.
    #[instrument(skip(self, content), fields(tenant_id = %tenant_id, sender_id = %sender_id))]
    pub fn record_outbound(
        &self,
        tenant_id: &TenantId,
        sender_id: &SenderId,
        session_id: &str,
        content: &str,
    ) -> Result<Message> {
        self.insert_message(
            tenant_id,
            sender_id,
            session_id,
            None,
            MessageDirection::Outbound,
            content,
            DeliveryStatus::Pending,
        )
    }

    pub fn set_delivery_status(
        &self,
        message_id: &str,
        status: DeliveryStatus,
        external_id: Option<&str>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE messages SET delivery_status = ?2, external_id = COALESCE(?3, external_id) WHERE id = ?1",
            rusqlite::params![message_id, status.to_string(), external_id],
        )?;
        Ok(())
    }

    /// Most recent messages for `(tenant_id, sender_id)`, oldest first.
    pub fn recent_history(
        &self,
        tenant_id: &TenantId,
        sender_id: &SenderId,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, tenant_id, sender_id, session_id, external_id, direction,
                    content, delivery_status, created_at
             FROM messages WHERE tenant_id = ?1 AND sender_id = ?2
             ORDER BY created_at DESC LIMIT ?3",
        )?;
        let mut rows = stmt
            .query_map(rusqlite::params![tenant_id.as_str(), sender_id.as_str(), limit as i64], row_to_message)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.reverse();
        Ok(rows)
    }

    fn insert_message(
        &self,
        tenant_id: &TenantId,
        sender_id: &SenderId,
        session_id: &str,
        external_id: Option<&str>,
        direction: MessageDirection,
        content: &str,
        delivery_status: DeliveryStatus,
    ) -> Result<Message> {
        let message = Message {
            id: Uuid::now_v7().to_string(),
            tenant_id: tenant_id.clone(),
            sender_id: sender_id.clone(),
            session_id: session_id.to_string(),
            external_id: external_id.map(String::from),
            direction,
            content: content.to_string(),
            delivery_status,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO messages (id, tenant_id, sender_id, session_id, external_id, direction, content, delivery_status, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            rusqlite::params![
                message.id,
                message.tenant_id.as_str(),
                message.sender_id.as_str(),
                message.session_id,
                message.external_id,
                message.direction.to_string(),
                message.content,
                message.delivery_status.to_string(),
                message.created_at,
            ],
        )?;
        db.execute(
            "UPDATE conversation_sessions SET last_activity_at = ?1 WHERE id = ?2",
            rusqlite::params![message.created_at, message.session_id],
        )?;
        Ok(message)
    }

    /// Mark every session whose `last_activity_at` is older than `idle_hours`
    /// as ended. Returns the number of sessions expired.
    #[instrument(skip(self))]
    pub fn expire_idle(&self, idle_hours: i64) -> Result<usize> {
        let cutoff = (chrono::Utc::now() - Duration::hours(idle_hours)).to_rfc3339();
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "UPDATE conversation_sessions
             SET ended_at = last_activity_at, lease_owner = NULL, lease_expires_at = NULL
             WHERE ended_at IS NULL AND last_activity_at < ?1",
            rusqlite::params![cutoff],
        )?;
        Ok(rows)
    }
}

/// The at-most-one active (non-ended) row for `(tenant_id, sender_id)`.
fn query_active_session(
    db: &Connection,
    tenant_id: &TenantId,
    sender_id: &SenderId,
) -> Result<Option<Session>> {
    match db.query_row(
        "SELECT id, tenant_id, sender_id, started_at, last_activity_at,
                ended_at, lease_owner, lease_expires_at
         FROM conversation_sessions
         WHERE tenant_id = ?1 AND sender_id = ?2 AND ended_at IS NULL",
        rusqlite::params![tenant_id.as_str(), sender_id.as_str()],
        row_to_session,
    ) {
        Ok(s) => Ok(Some(s)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(SessionError::Database(e)),
    }
}

fn query_session_by_id(db: &Connection, id: &str) -> Result<Option<Session>> {
    match db.query_row(
        "SELECT id, tenant_id, sender_id, started_at, last_activity_at,
                ended_at, lease_owner, lease_expires_at
         FROM conversation_sessions WHERE id = ?1",
        rusqlite::params![id],
        row_to_session,
    ) {
        Ok(s) => Ok(Some(s)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(SessionError::Database(e)),
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        tenant_id: TenantId::from(row.get::<_, String>(1)?),
        sender_id: SenderId::from(row.get::<_, String>(2)?),
        started_at: row.get(3)?,
        last_activity_at: row.get(4)?,
        ended_at: row.get(5)?,
        lease_owner: row.get(6)?,
        lease_expires_at: row.get(7)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    use std::str::FromStr;
    let direction: String = row.get(5)?;
    let delivery_status: String = row.get(7)?;
    Ok(Message {
        id: row.get(0)?,
        tenant_id: TenantId::from(row.get::<_, String>(1)?),
        sender_id: SenderId::from(row.get::<_, String>(2)?),
        session_id: row.get(3)?,
        external_id: row.get(4)?,
        direction: MessageDirection::from_str(&direction).unwrap_or(MessageDirection::Inbound),
        content: row.get(6)?,
        delivery_status: DeliveryStatus::from_str(&delivery_status).unwrap_or(DeliveryStatus::Pending),
        created_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_manager() -> SessionManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        SessionManager::new(conn)
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mgr = test_manager();
        let tenant = TenantId::from("t-1");
        let sender = SenderId::from("+1555");
        let (s1, new1) = mgr.get_or_create(&tenant, &sender, 300, 24).unwrap();
        let (s2, new2) = mgr.get_or_create(&tenant, &sender, 300, 24).unwrap();
        assert_eq!(s1.id, s2.id);
        assert!(new1);
        assert!(!new2);
    }

    #[test]
    fn expired_lease_can_be_reclaimed() {
        let mgr = test_manager();
        let tenant = TenantId::from("t-1");
        let sender = SenderId::from("+1555");
        let (s1, _) = mgr.get_or_create(&tenant, &sender, -1, 24).unwrap();
        assert!(s1.lease_expires_at.is_some());
        let (s2, is_new) = mgr.get_or_create(&tenant, &sender, 300, 24).unwrap();
        assert_eq!(s1.id, s2.id);
        assert!(!is_new);
    }

    #[test]
    fn message_history_round_trips_in_order() {
        let mgr = test_manager();
        let tenant = TenantId::from("t-1");
        let sender = SenderId::from("+1555");
        let (session, _) = mgr.get_or_create(&tenant, &sender, 300, 24).unwrap();

        mgr.record_inbound(&tenant, &sender, &session.id, Some("ext-1"), "hi").unwrap();
        let out = mgr.record_outbound(&tenant, &sender, &session.id, "hello back").unwrap();
        mgr.set_delivery_status(&out.id, DeliveryStatus::Sent, Some("ext-2")).unwrap();

        let history = mgr.recent_history(&tenant, &sender, 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].delivery_status, DeliveryStatus::Sent);
        assert_eq!(history[1].external_id.as_deref(), Some("ext-2"));
    }

    #[test]
    fn recording_a_message_advances_last_activity_at() {
        let mgr = test_manager();
        let tenant = TenantId::from("t-1");
        let sender = SenderId::from("+1555");
        let (session, _) = mgr.get_or_create(&tenant, &sender, 300, 24).unwrap();
        let started = session.last_activity_at.clone();

        std::thread::sleep(std::time::Duration::from_millis(5));
        mgr.record_inbound(&tenant, &sender, &session.id, None, "hi").unwrap();

        let refreshed = query_session_by_id(&mgr.db.lock().unwrap(), &session.id)
            .unwrap()
            .unwrap();
        assert!(refreshed.last_activity_at > started);
    }

    #[test]
    fn end_clears_lease_and_sets_ended_at() {
        let mgr = test_manager();
        let tenant = TenantId::from("t-1");
        let sender = SenderId::from("+1555");
        mgr.get_or_create(&tenant, &sender, 300, 24).unwrap();
        mgr.end(&tenant, &sender).unwrap();
        assert!(query_active_session(&mgr.db.lock().unwrap(), &tenant, &sender)
            .unwrap()
            .is_none());
    }

    #[test]
    fn idle_session_is_ended_and_replaced_with_a_fresh_one() {
        let mgr = test_manager();
        let tenant = TenantId::from("t-1");
        let sender = SenderId::from("+1555");
        let (first, _) = mgr.get_or_create(&tenant, &sender, 300, 24).unwrap();

        // Force the existing session's last_activity_at far enough into the
        // past that it falls outside any idle window.
        mgr.db
            .lock()
            .unwrap()
            .execute(
                "UPDATE conversation_sessions SET last_activity_at = ?1 WHERE id = ?2",
                rusqlite::params!["2000-01-01T00:00:00+00:00", first.id],
            )
            .unwrap();

        let (second, is_new) = mgr.get_or_create(&tenant, &sender, 300, 24).unwrap();
        assert!(is_new);
        assert_ne!(first.id, second.id);

        let ended_first = query_session_by_id(&mgr.db.lock().unwrap(), &first.id)
            .unwrap()
            .unwrap();
        assert!(ended_first.ended_at.is_some());
    }

    #[test]
    fn explicit_end_then_get_or_create_produces_a_fresh_session_id() {
        let mgr = test_manager();
        let tenant = TenantId::from("t-1");
        let sender = SenderId::from("+1555");
        let (first, _) = mgr.get_or_create(&tenant, &sender, 300, 24).unwrap();
        mgr.end(&tenant, &sender).unwrap();

        let (second, is_new) = mgr.get_or_create(&tenant, &sender, 300, 24).unwrap();
        assert!(is_new);
        assert_ne!(first.id, second.id);
    }
}
