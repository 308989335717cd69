//! Channel Server
//!
//! Serves the public key, the session handshake and the secure message
//! endpoint.

use channel_server::{AppState, ServerConfig, router};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("channel_server=debug".parse()?)
                .add_directive("crypto_session=info".parse()?)
                .add_directive("session_store=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = ServerConfig::parse();
    info!("Starting Channel Server");

    let state = AppState::from_config(&config).await?;
    info!(store = state.store.kind(), "Session store ready");

    let app = router(state);

    info!("Listening on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Channel Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
