//! Channel Server
//!
//! HTTP front for the encrypted session channel: public key distribution,
//! session handshake and secure message exchange.

mod caller;
mod config;
mod error;
mod routes;
mod state;

pub use caller::Caller;
pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 64 * 1024;
