//! Server configuration from command line and environment

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use crypto_session::{DEFAULT_KEY_DIR, KeyConfig, RSA_MODULUS_BITS};
use session_store::{DEFAULT_OP_TIMEOUT, DEFAULT_SESSION_TTL, DEFAULT_SWEEP_INTERVAL, StoreConfig};

/// Channel server configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "channel-server", version, about = "Encrypted session channel over HTTP")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "CHANNEL_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Directory holding the server keypair
    #[arg(long, env = "CHANNEL_KEY_DIR", default_value = DEFAULT_KEY_DIR)]
    pub key_dir: PathBuf,

    /// Redis URL; enables the shared session store
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Session lifetime in seconds
    #[arg(long, env = "SESSION_TTL_SECS", default_value_t = DEFAULT_SESSION_TTL.as_secs())]
    pub session_ttl_secs: u64,

    /// Bound on each session store round trip, in milliseconds
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = DEFAULT_OP_TIMEOUT.as_millis() as u64)]
    pub store_timeout_ms: u64,

    /// In-memory store sweep interval in seconds (0 disables the sweeper)
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = DEFAULT_SWEEP_INTERVAL.as_secs())]
    pub sweep_interval_secs: u64,

    /// Reject session and secure requests that carry no caller identity from
    /// the auth layer. Pass `false` to serve them unauthenticated.
    #[arg(long, env = "REQUIRE_CALLER", default_value_t = true, action = ArgAction::Set)]
    pub require_caller: bool,
}

impl ServerConfig {
    pub fn key_config(&self) -> KeyConfig {
        KeyConfig {
            key_dir: self.key_dir.clone(),
            modulus_bits: RSA_MODULUS_BITS,
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            redis_url: self.redis_url.clone(),
            ttl: Duration::from_secs(self.session_ttl_secs),
            op_timeout: Duration::from_millis(self.store_timeout_ms),
            sweep_interval: (self.sweep_interval_secs > 0)
                .then(|| Duration::from_secs(self.sweep_interval_secs)),
        }
    }
}
