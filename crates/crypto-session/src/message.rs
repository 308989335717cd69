//! Secure message exchange over an established session

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use session_store::SessionStore;
use shared_protocol::{CallerIdentity, Envelope, EnvelopeBody, EnvelopeReply, SessionId};
use tracing::debug;

use crate::{CryptoError, CryptoResult, SessionCipher};

/// What the application knows about an incoming message
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub session_id: SessionId,
    /// Identity supplied by the outer auth layer, if any
    pub caller: Option<CallerIdentity>,
}

/// Application hook receiving decrypted payloads
#[async_trait]
pub trait PayloadHandler: Send + Sync {
    /// Turn a request plaintext into a response plaintext
    async fn handle(&self, ctx: &MessageContext, plaintext: Vec<u8>) -> CryptoResult<Vec<u8>>;
}

/// Answers every message with `{"ok":true,"got":"<message>"}`
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

#[derive(Serialize)]
struct EchoReply<'a> {
    ok: bool,
    got: &'a str,
}

#[async_trait]
impl PayloadHandler for EchoHandler {
    async fn handle(&self, _ctx: &MessageContext, plaintext: Vec<u8>) -> CryptoResult<Vec<u8>> {
        let got = String::from_utf8_lossy(&plaintext);
        serde_json::to_vec(&EchoReply { ok: true, got: &got })
            .map_err(|e| CryptoError::Processing(e.to_string()))
    }
}

/// A session resolved from the store, ready to decrypt and encrypt
pub struct OpenSession {
    pub id: SessionId,
    cipher: SessionCipher,
}

/// Server side of the message exchange
pub struct SecureMessageHandler {
    store: Arc<dyn SessionStore>,
    payloads: Arc<dyn PayloadHandler>,
}

impl SecureMessageHandler {
    pub fn new(store: Arc<dyn SessionStore>, payloads: Arc<dyn PayloadHandler>) -> Self {
        Self { store, payloads }
    }

    /// Resolve a session id; unknown, expired and malformed ids are all
    /// `Unauthorized`
    pub async fn open_session(&self, session_id: &str) -> CryptoResult<OpenSession> {
        let id = SessionId::parse(session_id).ok_or(CryptoError::Unauthorized)?;
        let key = self
            .store
            .session_key(&id)
            .await?
            .ok_or(CryptoError::Unauthorized)?;

        Ok(OpenSession {
            cipher: SessionCipher::new(&key),
            id,
        })
    }

    /// Decrypt a request, run the payload handler, encrypt its answer under a
    /// fresh IV
    pub async fn respond(
        &self,
        session: &OpenSession,
        body: &EnvelopeBody,
        caller: Option<CallerIdentity>,
    ) -> CryptoResult<EnvelopeReply> {
        let envelope = Envelope::try_from(body)?;
        let plaintext = session.cipher.open(&envelope)?;

        debug!(
            session_id = %session.id,
            bytes = plaintext.len(),
            "Secure message decrypted"
        );

        let ctx = MessageContext {
            session_id: session.id.clone(),
            caller,
        };
        let response = self.payloads.handle(&ctx, plaintext).await?;

        let sealed = session.cipher.seal(&response, None)?;
        Ok(EnvelopeReply::new(&sealed.iv, &sealed.ciphertext))
    }

    /// `open_session` followed by `respond`
    pub async fn handle(
        &self,
        session_id: &str,
        body: &EnvelopeBody,
        caller: Option<CallerIdentity>,
    ) -> CryptoResult<EnvelopeReply> {
        let session = self.open_session(session_id).await?;
        self.respond(&session, body, caller).await
    }

    /// End a session early; closing an unknown session is a no-op
    pub async fn close(&self, session_id: &str) -> CryptoResult<()> {
        if let Some(id) = SessionId::parse(session_id) {
            self.store.delete_session(&id).await?;
        }
        Ok(())
    }
}
