//! Session storage

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use zkauth_common::{Error, Result, SessionId, SessionRecord, SessionState};

/// Storage backend for sign-in sessions
///
/// Every operation is atomic per session id. Expired sessions behave as if
/// they were never stored.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a freshly issued session, replacing any session with the same id
    async fn put(&self, record: SessionRecord) -> Result<()>;

    /// Get a live session
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>>;

    /// Claim an issued session for verification
    ///
    /// Moves the session from `Issued` to `Pending` and returns it. Fails with
    /// `SessionNotFound` for unknown or expired ids and with
    /// `SessionAlreadyConsumed` when another callback claimed it first.
    async fn consume(&self, id: &SessionId) -> Result<SessionRecord>;

    /// Record the verification outcome of a claimed session
    ///
    /// Ignored when the session has since been re-issued with another request.
    async fn complete(&self, id: &SessionId, request_id: &str, state: SessionState)
        -> Result<()>;

    /// Drop expired sessions, returning how many were removed
    async fn purge_expired(&self) -> Result<usize>;
}

/// In-process session store
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<SessionId, SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put(&self, record: SessionRecord) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        if sessions.insert(record.session_id.clone(), record).is_some() {
            debug!("Replaced existing session");
        }
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .get(id)
            .filter(|record| !record.is_expired(Utc::now()))
            .cloned())
    }

    async fn consume(&self, id: &SessionId) -> Result<SessionRecord> {
        let mut sessions = self.sessions.lock().await;

        let record = sessions
            .get_mut(id)
            .filter(|record| !record.is_expired(Utc::now()))
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;

        if record.state != SessionState::Issued {
            return Err(Error::SessionAlreadyConsumed(id.to_string()));
        }

        record.state = SessionState::Pending;
        Ok(record.clone())
    }

    async fn complete(
        &self,
        id: &SessionId,
        request_id: &str,
        state: SessionState,
    ) -> Result<()> {
        let mut sessions = self.sessions.lock().await;

        match sessions.get_mut(id) {
            Some(record) if record.request.id == request_id => record.state = state,
            _ => debug!("Session {} was re-issued, dropping outcome", id),
        }
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;

        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired(now));
        Ok(before - sessions.len())
    }
}
