//! Redis-backed session storage
//!
//! Sessions live under `session:{id}` as JSON with the session TTL. State
//! transitions are compare-and-swap: the new record is written only if the
//! stored JSON is still the one the transition was computed from, so a
//! concurrent re-issue or callback is never overwritten.

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::{debug, info, warn};
use zkauth_common::{Error, Result, SessionId, SessionRecord, SessionState};

use crate::storage::SessionStore;

/// Replace KEYS[1] with ARGV[2] if it still holds ARGV[1], keeping its TTL
const SWAP_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) ~= ARGV[1] then
    return 0
end
redis.call('SET', KEYS[1], ARGV[2], 'KEEPTTL')
return 1
";

/// Attempts before giving up on a session that keeps changing underneath
const MAX_SWAP_ATTEMPTS: usize = 8;

fn redis_err(e: redis::RedisError) -> Error {
    Error::Redis(e.to_string())
}

fn session_key(id: &SessionId) -> String {
    format!("session:{}", id)
}

/// Session store shared through Redis
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    swap: Script,
}

impl RedisStore {
    /// Connect to Redis
    pub async fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            conn,
            swap: Script::new(SWAP_SCRIPT),
        })
    }

    /// Stored JSON of a session, as written
    async fn load_raw(&self, id: &SessionId) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(session_key(id)).await.map_err(redis_err)
    }

    /// Write `record` only if the session still holds `expected`
    async fn swap(&self, id: &SessionId, expected: &str, record: &SessionRecord) -> Result<bool> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(record)?;

        let swapped: i64 = self
            .swap
            .key(session_key(id))
            .arg(expected)
            .arg(json)
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;

        Ok(swapped == 1)
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn put(&self, record: SessionRecord) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(&record)?;
        let ttl = record.remaining_secs(Utc::now());

        let _: () = redis::cmd("SET")
            .arg(session_key(&record.session_id))
            .arg(json)
            .arg("EX")
            .arg(ttl)
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;

        debug!("Stored session {} for {}s", record.session_id, ttl);
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        match self.load_raw(id).await? {
            Some(data) => {
                let record: SessionRecord = serde_json::from_str(&data)?;
                Ok(Some(record).filter(|record| !record.is_expired(Utc::now())))
            }
            None => Ok(None),
        }
    }

    async fn consume(&self, id: &SessionId) -> Result<SessionRecord> {
        for _ in 0..MAX_SWAP_ATTEMPTS {
            let raw = self
                .load_raw(id)
                .await?
                .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;

            let mut record: SessionRecord = serde_json::from_str(&raw)?;
            if record.is_expired(Utc::now()) {
                return Err(Error::SessionNotFound(id.to_string()));
            }
            if record.state != SessionState::Issued {
                return Err(Error::SessionAlreadyConsumed(id.to_string()));
            }

            record.state = SessionState::Pending;
            if self.swap(id, &raw, &record).await? {
                return Ok(record);
            }
            debug!("Session {} changed while claiming, retrying", id);
        }

        Err(Error::Redis(format!("session {} kept changing while claiming", id)))
    }

    async fn complete(
        &self,
        id: &SessionId,
        request_id: &str,
        state: SessionState,
    ) -> Result<()> {
        for _ in 0..MAX_SWAP_ATTEMPTS {
            let Some(raw) = self.load_raw(id).await? else {
                debug!("Session {} expired, dropping outcome", id);
                return Ok(());
            };

            let mut record: SessionRecord = serde_json::from_str(&raw)?;
            if record.request.id != request_id {
                debug!("Session {} was re-issued, dropping outcome", id);
                return Ok(());
            }

            record.state = state.clone();
            if self.swap(id, &raw, &record).await? {
                return Ok(());
            }
        }

        warn!("Session {} kept changing, outcome not recorded", id);
        Err(Error::Redis(format!("session {} kept changing while completing", id)))
    }

    async fn purge_expired(&self) -> Result<usize> {
        // Redis expires keys on its own
        Ok(0)
    }
}
