//! Session store error types

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Session already exists: {0}")]
    DuplicateSession(String),

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Corrupt session entry: {0}")]
    Corrupt(String),

    #[error("Store configuration error: {0}")]
    Configuration(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
