//! Shared Protocol Definitions for the encrypted channel
//!
//! Wire bodies exchanged between clients and the channel server, plus the
//! identifiers both sides agree on.

mod error;
mod packets;
mod session;

pub use error::*;
pub use packets::*;
pub use session::*;

/// Raw size of a session identifier (128 bits)
pub const SESSION_ID_BYTES: usize = 16;

/// Length of the hex-encoded session identifier
pub const SESSION_ID_LEN: usize = SESSION_ID_BYTES * 2;

/// AES-GCM IV size (96 bits / 12 bytes)
pub const IV_SIZE: usize = 12;
