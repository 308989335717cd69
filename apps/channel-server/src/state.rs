//! Application state

use std::sync::Arc;

use anyhow::Context;
use crypto_session::{
    EchoHandler, HandshakeHandler, KeyManager, PayloadHandler, SecureMessageHandler,
};
use session_store::{SessionStore, build_store};
use tracing::info;

use crate::config::ServerConfig;

/// Shared handles for request handlers
#[derive(Clone)]
pub struct AppState {
    pub keys: Arc<KeyManager>,
    pub store: Arc<dyn SessionStore>,
    pub handshake: Arc<HandshakeHandler>,
    pub messages: Arc<SecureMessageHandler>,
    /// Channel endpoints demand a caller identity from the auth layer
    pub require_caller: bool,
}

impl AppState {
    pub fn new(
        keys: Arc<KeyManager>,
        store: Arc<dyn SessionStore>,
        payloads: Arc<dyn PayloadHandler>,
        require_caller: bool,
    ) -> Self {
        Self {
            handshake: Arc::new(HandshakeHandler::new(keys.clone(), store.clone())),
            messages: Arc::new(SecureMessageHandler::new(store.clone(), payloads)),
            keys,
            store,
            require_caller,
        }
    }

    /// Build everything from configuration. Key storage problems are fatal.
    pub async fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let keys = Arc::new(KeyManager::new(config.key_config())?);

        // First start generates an RSA-3072 keypair; keep it off the runtime
        let init = keys.clone();
        tokio::task::spawn_blocking(move || init.ensure_keys())
            .await?
            .context("server keypair unavailable")?;
        info!(dir = %keys.key_dir().display(), "Server keypair ready");

        let store = build_store(&config.store_config())
            .await
            .context("session store unavailable")?;

        Ok(Self::new(
            keys,
            store,
            Arc::new(EchoHandler),
            config.require_caller,
        ))
    }
}
