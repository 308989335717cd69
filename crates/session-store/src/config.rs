//! Store selection

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::{
    DEFAULT_OP_TIMEOUT, DEFAULT_SESSION_TTL, DEFAULT_SWEEP_INTERVAL, MemorySessionStore,
    RedisSessionStore, SessionStore, StoreError, StoreResult,
};

/// Session store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis URL; selects the shared store when present
    pub redis_url: Option<String>,
    /// Session lifetime (both backends)
    pub ttl: Duration,
    /// Bound on each Redis round trip
    pub op_timeout: Duration,
    /// Sweep interval for the in-memory store (None disables the sweeper)
    pub sweep_interval: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl: DEFAULT_SESSION_TTL,
            op_timeout: DEFAULT_OP_TIMEOUT,
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
        }
    }
}

/// Build the configured store. Called once at startup; the choice is never
/// revisited per request.
pub async fn build_store(config: &StoreConfig) -> StoreResult<Arc<dyn SessionStore>> {
    if config.ttl.is_zero() {
        return Err(StoreError::Configuration("session TTL must be non-zero".into()));
    }

    match config.redis_url.as_deref().filter(|url| !url.is_empty()) {
        Some(url) => {
            info!("Using Redis session store");
            let store = RedisSessionStore::connect(url, config.ttl, config.op_timeout).await?;
            Ok(Arc::new(store))
        }
        None => {
            info!(ttl_secs = config.ttl.as_secs(), "Using in-memory session store");
            let store = Arc::new(MemorySessionStore::new(config.ttl));
            if let Some(interval) = config.sweep_interval {
                store.spawn_sweeper(interval);
            }
            Ok(store)
        }
    }
}
