use std::sync::Arc;

use crate::auth::TokenSigner;
use crate::config::ServerConfig;
use crate::registry::RoomRegistry;

/// Shared application state
#[derive(Debug)]
pub struct AppState {
    pub rooms: RoomRegistry,
    pub tokens: TokenSigner,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            rooms: RoomRegistry::new(),
            tokens: config.token_signer(),
            config,
        }
    }

    /// State with a fixed token key, for tests
    pub fn with_signer(config: ServerConfig, tokens: TokenSigner) -> Self {
        Self {
            rooms: RoomRegistry::new(),
            tokens,
            config,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_signer(ServerConfig::default(), TokenSigner::random())
    }
}

/// Spawn a background task that drops rooms created over HTTP that nobody ever connected to
pub fn spawn_room_sweeper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let grace = state.config.room_claim_grace;
        loop {
            tokio::time::sleep(grace).await;

            let pruned = state.rooms.prune_abandoned(grace).await;
            if pruned > 0 {
                tracing::debug!(pruned, "swept abandoned rooms");
            }
        }
    });
}
