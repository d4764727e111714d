//! Server configuration, read from the environment (and `.env`, loaded in `main`)

use std::net::SocketAddr;
use std::time::Duration;

use crate::auth::TokenSigner;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:4263";
const DEFAULT_PING_INTERVAL_SECS: u64 = 15;
const DEFAULT_PONG_TIMEOUT_SECS: u64 = 45;
const DEFAULT_ROOM_CLAIM_GRACE_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// HMAC key for session tokens (None = random per process)
    pub token_secret: Option<String>,
    /// How often each connection is pinged
    pub ping_interval: Duration,
    /// Connections silent for longer than this are treated as closed
    pub pong_timeout: Duration,
    /// Rooms nobody has connected to within this long are dropped
    pub room_claim_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 4263)),
            token_secret: None,
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            pong_timeout: Duration::from_secs(DEFAULT_PONG_TIMEOUT_SECS),
            room_claim_grace: Duration::from_secs(DEFAULT_ROOM_CLAIM_GRACE_SECS),
        }
    }
}

impl ServerConfig {
    /// Load config from environment variables
    /// HANGMAN_BIND_ADDR, HANGMAN_TOKEN_SECRET, HANGMAN_PING_INTERVAL_SECS,
    /// HANGMAN_PONG_TIMEOUT_SECS, HANGMAN_ROOM_CLAIM_GRACE_SECS
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("HANGMAN_BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = match bind_addr.trim().parse() {
            Ok(addr) => addr,
            Err(e) => {
                tracing::warn!(
                    "Invalid HANGMAN_BIND_ADDR {:?} ({}), using {}",
                    bind_addr,
                    e,
                    DEFAULT_BIND_ADDR
                );
                Self::default().bind_addr
            }
        };

        let token_secret = std::env::var("HANGMAN_TOKEN_SECRET")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            bind_addr,
            token_secret,
            ping_interval: secs_from_env("HANGMAN_PING_INTERVAL_SECS", DEFAULT_PING_INTERVAL_SECS),
            pong_timeout: secs_from_env("HANGMAN_PONG_TIMEOUT_SECS", DEFAULT_PONG_TIMEOUT_SECS),
            room_claim_grace: secs_from_env(
                "HANGMAN_ROOM_CLAIM_GRACE_SECS",
                DEFAULT_ROOM_CLAIM_GRACE_SECS,
            ),
        }
    }

    pub fn token_signer(&self) -> TokenSigner {
        match &self.token_secret {
            Some(secret) => TokenSigner::new(secret.as_bytes()),
            None => {
                tracing::warn!(
                    "HANGMAN_TOKEN_SECRET not set - using a random key, tokens will not survive a restart"
                );
                TokenSigner::random()
            }
        }
    }
}

fn secs_from_env(var: &str, default: u64) -> Duration {
    let secs = match std::env::var(var) {
        Ok(value) => match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => {
                tracing::warn!("Invalid {} {:?}, using {}", var, value, default);
                default
            }
        },
        Err(_) => default,
    };
    Duration::from_secs(secs)
}
