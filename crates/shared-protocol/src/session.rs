//! Session and caller identifiers

use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};

use crate::{SESSION_ID_BYTES, SESSION_ID_LEN};

/// Opaque session identifier: 128 random bits, lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Draw a fresh identifier from the OS random source
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Parse a client-supplied identifier.
    ///
    /// Anything that is not exactly 32 hex digits is rejected; uppercase
    /// input is normalized so lookups stay case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.len() != SESSION_ID_LEN || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the caller, established by an external auth layer before a
/// request reaches the channel endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerIdentity(pub String);

impl CallerIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
