use std::sync::Arc;

use agentfleet_core::SessionKey;
use dashmap::DashMap;
use tracing::instrument;

use crate::error::{CliError, Result};
use crate::session::CliSession;
use crate::types::CliSessionSpec;

/// Registry of live CLI agent sessions, one per `(tenant, sender)` key.
///
/// Unlike the conversation session ledger in `agentfleet-sessions`, entries
/// here hold a real running child process and disappear entirely when the
/// process exits or is closed — there is no persisted row to reclaim.
pub struct CliSessionStore {
    sessions: DashMap<String, Arc<CliSession>>,
}

impl Default for CliSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CliSessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Spawn a new CLI session for `key`, replacing any existing one.
    #[instrument(skip(self, spec), fields(key = %key))]
    pub async fn create(&self, key: &SessionKey, spec: CliSessionSpec) -> Result<Arc<CliSession>> {
        if let Some((_, old)) = self.sessions.remove(key.as_str()) {
            let _ = old.close().await;
        }
        let session = Arc::new(CliSession::spawn(spec).await?);
        self.sessions.insert(key.as_str().to_string(), Arc::clone(&session));
        Ok(session)
    }

    pub fn has(&self, key: &SessionKey) -> bool {
        self.sessions
            .get(key.as_str())
            .map(|s| s.is_alive())
            .unwrap_or(false)
    }

    pub fn get(&self, key: &SessionKey) -> Result<Arc<CliSession>> {
        self.sessions
            .get(key.as_str())
            .map(|s| Arc::clone(s.value()))
            .filter(|s| s.is_alive())
            .ok_or_else(|| CliError::NotFound(key.to_string()))
    }

    /// Write one message into the session's stdin, creating a session first
    /// if one does not already exist for `key`.
    #[instrument(skip(self, value), fields(key = %key))]
    pub async fn inject_message(
        &self,
        key: &SessionKey,
        spec: CliSessionSpec,
        value: &serde_json::Value,
    ) -> Result<Arc<CliSession>> {
        let session = match self.get(key) {
            Ok(s) => s,
            Err(_) => self.create(key, spec).await?,
        };
        session.inject_message(value).await?;
        Ok(session)
    }

    /// Close and remove the session for `key`, if any.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn close(&self, key: &SessionKey) -> Result<()> {
        if let Some((_, session)) = self.sessions.remove(key.as_str()) {
            session.close().await?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
