//! Crypto Session - hybrid encrypted channel over plain request/response
//!
//! RSA-OAEP bootstraps a per-session AES-256-GCM key; every message after
//! that travels in an authenticated envelope with a fresh random IV.

mod error;
mod handshake;
mod keys;
mod message;
mod session;

pub use error::*;
pub use handshake::*;
pub use keys::*;
pub use message::*;
pub use session::*;

pub use session_store::{SESSION_KEY_SIZE, SessionKey};
pub use shared_protocol::IV_SIZE;

/// Authentication tag size (128 bits / 16 bytes)
pub const TAG_SIZE: usize = 16;

/// RSA modulus size for the server keypair
pub const RSA_MODULUS_BITS: usize = 3072;
