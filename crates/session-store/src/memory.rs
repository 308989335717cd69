//! Process-local session store

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use shared_protocol::SessionId;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::{Clock, SessionKey, SessionStore, StoreError, StoreResult, SystemClock};

/// Stored session
struct SessionEntry {
    key: SessionKey,
    expires_at: Instant,
}

impl SessionEntry {
    fn new(key: SessionKey, now: Instant, ttl: Duration) -> Self {
        Self {
            key,
            expires_at: now + ttl,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory session store.
///
/// Expiry is a timestamp checked on every lookup; an optional sweep task
/// reclaims entries nobody asks for again. There are no per-session timers,
/// so a delete racing an expiry can never resurrect or double-remove an entry.
pub struct MemorySessionStore {
    entries: DashMap<SessionId, SessionEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a store reading time from `clock`
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, including expired ones not yet reclaimed
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Run `sweep_expired` every `interval` until the store is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(store) = store.upgrade() else {
                    debug!("Session store dropped, sweeper exiting");
                    break;
                };

                let removed = store.sweep_expired();
                if removed > 0 {
                    debug!(removed, remaining = store.len(), "Swept expired sessions");
                }
            }
        })
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, id: &SessionId, key: SessionKey) -> StoreResult<()> {
        let now = self.clock.now();

        match self.entries.entry(id.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired(now) {
                    return Err(StoreError::DuplicateSession(id.to_string()));
                }
                occupied.insert(SessionEntry::new(key, now, self.ttl));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(SessionEntry::new(key, now, self.ttl));
            }
        }

        debug!(session_id = %id, ttl_secs = self.ttl.as_secs(), "Session stored");
        Ok(())
    }

    async fn session_key(&self, id: &SessionId) -> StoreResult<Option<SessionKey>> {
        let now = self.clock.now();

        // The read guard must be released before `remove_if` locks the shard
        let lookup = self
            .entries
            .get(id)
            .map(|entry| (!entry.is_expired(now)).then(|| entry.key.clone()));

        match lookup {
            Some(Some(key)) => Ok(Some(key)),
            Some(None) => {
                self.entries.remove_if(id, |_, entry| entry.is_expired(now));
                debug!(session_id = %id, "Session expired");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete_session(&self, id: &SessionId) -> StoreResult<()> {
        if self.entries.remove(id).is_some() {
            debug!(session_id = %id, "Session deleted");
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_SESSION_TTL, ManualClock};

    fn store_with_clock() -> (MemorySessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = MemorySessionStore::with_clock(DEFAULT_SESSION_TTL, clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let (store, _clock) = store_with_clock();
        let id = SessionId::generate();
        let key = SessionKey::generate();

        store.create_session(&id, key.clone()).await.unwrap();

        assert_eq!(store.session_key(&id).await.unwrap(), Some(key));
    }

    #[tokio::test]
    async fn test_unknown_session_is_absent() {
        let (store, _clock) = store_with_clock();
        assert!(store.session_key(&SessionId::generate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_expires_after_ttl() {
        let (store, clock) = store_with_clock();
        let id = SessionId::generate();
        store.create_session(&id, SessionKey::generate()).await.unwrap();

        clock.advance(DEFAULT_SESSION_TTL - Duration::from_secs(1));
        assert!(store.session_key(&id).await.unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert!(store.session_key(&id).await.unwrap().is_none());
        // Lazy expiry reclaims the entry on lookup
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (store, _clock) = store_with_clock();
        let id = SessionId::generate();
        store.create_session(&id, SessionKey::generate()).await.unwrap();

        store.delete_session(&id).await.unwrap();
        assert!(store.session_key(&id).await.unwrap().is_none());

        // Deleting again is harmless
        store.delete_session(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_live_id_rejected() {
        let (store, clock) = store_with_clock();
        let id = SessionId::generate();
        let first = SessionKey::generate();
        store.create_session(&id, first.clone()).await.unwrap();

        let err = store
            .create_session(&id, SessionKey::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateSession(_)));
        assert_eq!(store.session_key(&id).await.unwrap(), Some(first));

        // Once expired, the id may be registered again
        clock.advance(DEFAULT_SESSION_TTL);
        let second = SessionKey::generate();
        store.create_session(&id, second.clone()).await.unwrap();
        assert_eq!(store.session_key(&id).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_sweep_keeps_reused_id() {
        let (store, clock) = store_with_clock();
        let id = SessionId::generate();
        store.create_session(&id, SessionKey::generate()).await.unwrap();

        clock.advance(DEFAULT_SESSION_TTL / 2);
        store.delete_session(&id).await.unwrap();
        let replacement = SessionKey::generate();
        store.create_session(&id, replacement.clone()).await.unwrap();

        // The first session's deadline passes; the replacement must survive
        clock.advance(DEFAULT_SESSION_TTL / 2 + Duration::from_secs(1));
        assert_eq!(store.sweep_expired(), 0);
        assert_eq!(store.session_key(&id).await.unwrap(), Some(replacement));
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let (store, clock) = store_with_clock();
        let old = SessionId::generate();
        store.create_session(&old, SessionKey::generate()).await.unwrap();

        clock.advance(DEFAULT_SESSION_TTL / 2);
        let fresh = SessionId::generate();
        store.create_session(&fresh, SessionKey::generate()).await.unwrap();

        clock.advance(DEFAULT_SESSION_TTL / 2);
        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.session_key(&fresh).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task() {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemorySessionStore::with_clock(
            Duration::from_secs(10),
            clock.clone(),
        ));
        for _ in 0..5 {
            store
                .create_session(&SessionId::generate(), SessionKey::generate())
                .await
                .unwrap();
        }

        let handle = store.spawn_sweeper(Duration::from_secs(1));
        clock.advance(Duration::from_secs(11));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(store.is_empty());

        // Sweeper stops once the store is gone
        drop(store);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper did not exit")
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let store = Arc::new(MemorySessionStore::new(DEFAULT_SESSION_TTL));
        let mut tasks = Vec::new();

        for _ in 0..32 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let id = SessionId::generate();
                let key = SessionKey::generate();
                store.create_session(&id, key.clone()).await.unwrap();
                assert_eq!(store.session_key(&id).await.unwrap(), Some(key));
                store.delete_session(&id).await.unwrap();
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
        assert!(store.is_empty());
    }
}
