//! Redis-backed session store, shareable across service instances

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use shared_protocol::SessionId;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::{SessionKey, SessionStore, StoreError, StoreResult};

/// Namespace for session entries
pub const REDIS_KEY_PREFIX: &str = "session:";

/// Session store kept in Redis.
///
/// Entries carry a server-side expiry, so no timers live in this process.
/// Every round trip is bounded by `op_timeout`.
pub struct RedisSessionStore {
    conn: ConnectionManager,
    ttl: Duration,
    op_timeout: Duration,
}

impl RedisSessionStore {
    /// Connect to `url`, failing if the server is unreachable within `op_timeout`
    pub async fn connect(url: &str, ttl: Duration, op_timeout: Duration) -> StoreResult<Self> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Configuration(e.to_string()))?;
        let conn = bounded(op_timeout, ConnectionManager::new(client)).await?;

        info!(ttl_secs = ttl_secs(ttl), "Connected to Redis session store");

        Ok(Self {
            conn,
            ttl,
            op_timeout,
        })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create_session(&self, id: &SessionId, key: SessionKey) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let value = encode_key(&key);

        let mut cmd = redis::cmd("SET");
        cmd.arg(storage_key(id))
            .arg(value.as_str())
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(self.ttl));

        let reply: Option<String> = bounded(self.op_timeout, cmd.query_async(&mut conn)).await?;
        if reply.is_none() {
            return Err(StoreError::DuplicateSession(id.to_string()));
        }

        debug!(session_id = %id, "Session stored in Redis");
        Ok(())
    }

    async fn session_key(&self, id: &SessionId) -> StoreResult<Option<SessionKey>> {
        let mut conn = self.conn.clone();
        let key = storage_key(id);

        let value: Option<String> = bounded(self.op_timeout, conn.get(key.as_str())).await?;
        value.map(|v| decode_key(&Zeroizing::new(v))).transpose()
    }

    async fn delete_session(&self, id: &SessionId) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let key = storage_key(id);

        let _: () = bounded(self.op_timeout, conn.del(key.as_str())).await?;
        debug!(session_id = %id, "Session deleted from Redis");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "redis"
    }
}

async fn bounded<T, F>(limit: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

fn storage_key(id: &SessionId) -> String {
    format!("{}{}", REDIS_KEY_PREFIX, id)
}

/// Redis expiry has one-second resolution; never send zero
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn encode_key(key: &SessionKey) -> Zeroizing<String> {
    Zeroizing::new(STANDARD.encode(key.as_bytes()))
}

fn decode_key(value: &str) -> StoreResult<SessionKey> {
    let bytes = Zeroizing::new(
        STANDARD
            .decode(value)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
    );
    SessionKey::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
}
