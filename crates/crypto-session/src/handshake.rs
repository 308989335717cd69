//! Session establishment: RSA-OAEP key transport

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use rand::rngs::OsRng;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use session_store::{SessionStore, StoreError};
use sha2::Sha256;
use shared_protocol::{CreateSessionRequest, SessionId};
use tracing::{info, warn};

use crate::{CryptoError, CryptoResult, KeyManager, SessionCipher, SessionKey};

/// Fresh ids to try before giving up on a colliding store
const MAX_ID_ATTEMPTS: usize = 3;

/// Server side of the handshake
pub struct HandshakeHandler {
    keys: Arc<KeyManager>,
    store: Arc<dyn SessionStore>,
}

impl HandshakeHandler {
    pub fn new(keys: Arc<KeyManager>, store: Arc<dyn SessionStore>) -> Self {
        Self { keys, store }
    }

    /// Unwrap a client's base64 RSA-OAEP blob and register a session for it.
    ///
    /// Every problem with the blob (encoding, padding, wrong key, wrong
    /// length) is reported as the same `Decryption` error.
    pub async fn create_session(&self, encrypted_key: &str) -> CryptoResult<SessionId> {
        let wrapped = STANDARD
            .decode(encrypted_key.trim())
            .map_err(|e| CryptoError::Decryption(format!("invalid base64: {}", e)))?;

        // Key file checks, first-use generation and RSA decryption all block
        let keys = self.keys.clone();
        let key = tokio::task::spawn_blocking(move || {
            let unwrapped = keys.unwrap_key(&wrapped)?;
            SessionKey::from_slice(&unwrapped).map_err(|e| CryptoError::Decryption(e.to_string()))
        })
        .await
        .map_err(|e| CryptoError::Processing(format!("unwrap task failed: {}", e)))??;

        for _ in 0..MAX_ID_ATTEMPTS {
            let session_id = SessionId::generate();
            match self.store.create_session(&session_id, key.clone()).await {
                Ok(()) => {
                    info!(session_id = %session_id, store = self.store.kind(), "Session created");
                    return Ok(session_id);
                }
                Err(StoreError::DuplicateSession(_)) => {
                    warn!("Session id collision, retrying with a new id");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::Backend("could not allocate a unique session id".into()).into())
    }
}

/// Client side of the handshake.
///
/// Picks a random session key and wraps it under the server public key.
pub struct ClientHandshake {
    key: SessionKey,
    encrypted_key: String,
}

impl ClientHandshake {
    /// Start a handshake against the server's PEM public key
    pub fn new(server_public_pem: &str) -> CryptoResult<Self> {
        Self::with_key(server_public_pem, SessionKey::generate())
    }

    /// Start a handshake with a caller-chosen session key
    pub fn with_key(server_public_pem: &str, key: SessionKey) -> CryptoResult<Self> {
        let public = RsaPublicKey::from_public_key_pem(server_public_pem)
            .map_err(|e| CryptoError::MalformedInput(format!("invalid server public key: {}", e)))?;

        let wrapped = public
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key.as_bytes())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        Ok(Self {
            key,
            encrypted_key: STANDARD.encode(wrapped),
        })
    }

    /// Base64 wrapped key to send to the server
    pub fn encrypted_key(&self) -> &str {
        &self.encrypted_key
    }

    pub fn request(&self) -> CreateSessionRequest {
        CreateSessionRequest::new(self.encrypted_key.clone())
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Cipher for messages once the server accepted the session
    pub fn cipher(&self) -> SessionCipher {
        SessionCipher::new(&self.key)
    }
}
