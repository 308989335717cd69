//! Session store trait abstraction

use async_trait::async_trait;
use shared_protocol::SessionId;

use crate::{SessionKey, StoreResult};

/// Registry of live sessions.
///
/// Each operation is atomic with respect to concurrent callers touching the
/// same id. Unknown and expired ids read as `None`; an `Err` always means the
/// backend itself failed.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Register a new session. Fails with `DuplicateSession` if the id is live.
    async fn create_session(&self, id: &SessionId, key: SessionKey) -> StoreResult<()>;

    /// Look up the key of a live session
    async fn session_key(&self, id: &SessionId) -> StoreResult<Option<SessionKey>>;

    /// Remove a session; removing an absent id is not an error
    async fn delete_session(&self, id: &SessionId) -> StoreResult<()>;

    /// Short backend name for logs
    fn kind(&self) -> &'static str;
}
