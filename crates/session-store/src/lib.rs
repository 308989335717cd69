//! Session Store - id to session key registry with bounded lifetime
//!
//! Two interchangeable backends behind one trait:
//! - process-local map with lazy expiry and an optional sweep task
//! - Redis with server-managed expiry, shareable across instances

mod clock;
mod config;
mod error;
mod key;
mod memory;
mod redis_store;
mod traits;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use key::*;
pub use memory::*;
pub use redis_store::*;
pub use traits::*;

use std::time::Duration;

/// Session key size (AES-256)
pub const SESSION_KEY_SIZE: usize = 32;

/// Lifetime of a session, shared by both backends
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Upper bound on a single call to an external store
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Interval of the process-local sweep task
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
