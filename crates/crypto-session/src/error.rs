//! Crypto session error types

use session_store::StoreError;
use thiserror::Error;

/// Channel operation error.
///
/// Variants carry detail for logs only; the HTTP layer maps them to generic
/// messages so callers cannot tell failure causes apart.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key storage unusable: {0}")]
    Configuration(String),

    #[error("Session key unwrap failed: {0}")]
    Decryption(String),

    #[error("Decryption failed: authentication tag mismatch")]
    Authentication,

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unknown or expired session")]
    Unauthorized,

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Payload processing failed: {0}")]
    Processing(String),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

impl From<shared_protocol::ProtocolError> for CryptoError {
    fn from(e: shared_protocol::ProtocolError) -> Self {
        CryptoError::MalformedInput(e.to_string())
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
