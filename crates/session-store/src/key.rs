//! Symmetric session key

use rand::{RngCore, rngs::OsRng};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{SESSION_KEY_SIZE, StoreError, StoreResult};

/// 256-bit session key, wiped from memory on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl SessionKey {
    /// Build a key from raw bytes; anything but 32 bytes is rejected
    pub fn from_slice(bytes: &[u8]) -> StoreResult<Self> {
        let key: [u8; SESSION_KEY_SIZE] =
            bytes
                .try_into()
                .map_err(|_| StoreError::InvalidKeyLength {
                    expected: SESSION_KEY_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(Self(key))
    }

    /// Fresh random key from the OS random source
    pub fn generate() -> Self {
        let mut key = [0u8; SESSION_KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.0
    }
}

impl From<[u8; SESSION_KEY_SIZE]> for SessionKey {
    fn from(key: [u8; SESSION_KEY_SIZE]) -> Self {
        Self(key)
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}
