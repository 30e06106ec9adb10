//! SQLite-emulated fleet-wide advisory lock.
//!
//! SQLite has no `pg_advisory_lock`, so the single `scheduler_lock` row is
//! used instead: claiming it is one `UPDATE ... WHERE <not currently held>`
//! inside `BEGIN IMMEDIATE`, checked via `changes() == 1`.

use chrono::{Duration, Utc};
use rusqlite::Connection;

use crate::error::Result;

/// Attempt to claim the scheduler advisory lock for `owner`. Returns `true`
/// if this call claimed it, `false` if another holder's lease is still live.
pub fn try_claim(conn: &Connection, owner: &str, ttl: Duration) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let expires_at = (Utc::now() + ttl).to_rfc3339();

    conn.execute_batch("BEGIN IMMEDIATE;")?;
    let changed = conn.execute(
        "UPDATE scheduler_lock SET holder = ?1, expires_at = ?2
         WHERE id = 1 AND (holder IS NULL OR expires_at < ?3)",
        rusqlite::params![owner, expires_at, now],
    )?;
    conn.execute_batch("COMMIT;")?;

    Ok(changed == 1)
}

/// Release the lock if `owner` currently holds it.
pub fn release(conn: &Connection, owner: &str) -> Result<()> {
    conn.execute(
        "UPDATE scheduler_lock SET holder = NULL, expires_at = NULL
         WHERE id = 1 AND holder = ?1",
        rusqlite::params![owner],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    #[test]
    fn second_claimant_is_rejected_while_lease_live() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        assert!(try_claim(&conn, "host-a-1", Duration::seconds(60)).unwrap());
        assert!(!try_claim(&conn, "host-b-2", Duration::seconds(60)).unwrap());
    }

    #[test]
    fn expired_lease_can_be_reclaimed_by_another_holder() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        assert!(try_claim(&conn, "host-a-1", Duration::seconds(-1)).unwrap());
        assert!(try_claim(&conn, "host-b-2", Duration::seconds(60)).unwrap());
    }

    #[test]
    fn release_allows_immediate_reclaim() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        assert!(try_claim(&conn, "host-a-1", Duration::seconds(60)).unwrap());
        release(&conn, "host-a-1").unwrap();
        assert!(try_claim(&conn, "host-b-2", Duration::seconds(60)).unwrap());
    }
}
