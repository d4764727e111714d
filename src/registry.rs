//! Process-wide room registry.
//!
//! Each room owns its game and its client map behind its own mutex, so
//! independent rooms never contend. Lock order is always registry first,
//! then room; nothing takes the registry lock while holding a room.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::error::{GameError, GameResult};
use crate::game::Game;
use crate::types::*;

/// Outbound half of one WebSocket connection
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub connection_id: ConnectionId,
    tx: mpsc::UnboundedSender<String>,
}

impl ClientHandle {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            connection_id: ulid::Ulid::new().to_string(),
            tx,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a serialized payload. A closed connection is skipped silently.
    pub fn send(&self, payload: String) -> bool {
        self.is_open() && self.tx.send(payload).is_ok()
    }
}

/// One registry entry: the game plus the connections currently attached to it
#[derive(Debug)]
pub struct Room {
    pub name: RoomName,
    /// Fresh per room instance; session tokens carry it
    pub id: String,
    pub game: Game,
    /// At most one live connection per player
    pub clients: HashMap<PlayerName, ClientHandle>,
    /// Set once the room has been dropped from the registry
    pub retired: bool,
    created_at: Instant,
    ever_attached: bool,
}

impl Room {
    pub fn new(name: RoomName, game: Game) -> Self {
        Self {
            name,
            id: ulid::Ulid::new().to_string(),
            game,
            clients: HashMap::new(),
            retired: false,
            created_at: Instant::now(),
            ever_attached: false,
        }
    }

    /// Attach a connection, replacing any older one for the same player
    pub fn attach(&mut self, player: &str, handle: ClientHandle) -> Option<ClientHandle> {
        self.ever_attached = true;
        self.clients.insert(player.to_string(), handle)
    }

    /// Created over HTTP but nobody connected within `grace`
    pub fn is_abandoned(&self, grace: Duration) -> bool {
        !self.ever_attached && self.clients.is_empty() && self.created_at.elapsed() >= grace
    }

    /// Detach `player` only if `connection_id` is still the registered connection
    pub fn detach(&mut self, player: &str, connection_id: &str) -> bool {
        match self.clients.get(player) {
            Some(handle) if handle.connection_id == connection_id => {
                self.clients.remove(player);
                true
            }
            _ => false,
        }
    }
}

pub type SharedRoom = Arc<Mutex<Room>>;

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomName, SharedRoom>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, name: &str, game: Game) -> GameResult<SharedRoom> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(name) {
            return Err(GameError::RoomExists(name.to_string()));
        }
        let room = Arc::new(Mutex::new(Room::new(name.to_string(), game)));
        rooms.insert(name.to_string(), room.clone());
        tracing::info!(room = %name, "room created");
        Ok(room)
    }

    pub async fn get(&self, name: &str) -> Option<SharedRoom> {
        self.rooms.read().await.get(name).cloned()
    }

    pub async fn require(&self, name: &str) -> GameResult<SharedRoom> {
        self.get(name)
            .await
            .ok_or_else(|| GameError::RoomNotFound(name.to_string()))
    }

    pub async fn remove(&self, name: &str) -> Option<SharedRoom> {
        let removed = self.rooms.write().await.remove(name);
        if let Some(room) = &removed {
            room.lock().await.retired = true;
            tracing::info!(room = %name, "room removed");
        }
        removed
    }

    /// Remove the room if no client is attached any more.
    ///
    /// Must not be called while holding the room's lock.
    pub async fn remove_if_empty(&self, name: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get(name).cloned() else {
            return false;
        };
        let mut guard = room.lock().await;
        if !guard.clients.is_empty() {
            return false;
        }
        guard.retired = true;
        rooms.remove(name);
        tracing::info!(room = %name, "last client left, room removed");
        true
    }

    /// Drop every room nobody connected to within `grace`. Returns how many went.
    pub async fn prune_abandoned(&self, grace: Duration) -> usize {
        let mut rooms = self.rooms.write().await;
        let mut abandoned = Vec::new();
        for (name, room) in rooms.iter() {
            let mut guard = room.lock().await;
            if guard.is_abandoned(grace) {
                guard.retired = true;
                abandoned.push(name.clone());
            }
        }
        for name in &abandoned {
            rooms.remove(name);
            tracing::info!(room = %name, "nobody connected, room removed");
        }
        abandoned.len()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.rooms.read().await.contains_key(name)
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}
