//! Authoritative per-room game state machine.
//!
//! `WaitingRoom --start--> Running --(fewer than 2 remaining)--> Ended`
//!
//! Every operation checks all of its preconditions before touching any
//! state, so a rejected action leaves the game exactly as it was.

mod lobby;
pub mod player;
mod turn;

pub use lobby::normalize_name;
pub use player::{fill_in_chars, Player, PlayerView};
pub use turn::GuessOutcome;

use serde::{Serialize, Serializer};

use crate::error::{GameError, GameResult};
use crate::types::*;

#[derive(Debug, Clone)]
pub struct Game {
    room_state: RoomState,
    /// Insertion ordered, names unique
    players: Vec<Player>,
    min_chars: usize,
    max_chars: usize,
    current_player: Option<PlayerName>,
    waiting_room_marshal: Option<PlayerName>,
    /// Shuffled on start, fixed afterwards
    turn_order: Vec<PlayerName>,
}

/// Room-level state shared with every client
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    pub room_state: RoomState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_player: Option<PlayerName>,
    pub waiting_room_marshal: Option<PlayerName>,
    pub remaining_players: Vec<PlayerName>,
    pub min_chars: usize,
    pub max_chars: usize,
}

/// Full room state as seen by one viewer
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    /// Join order, sent as an object keyed by name
    #[serde(serialize_with = "serialize_by_name")]
    pub players: Vec<PlayerView>,
    pub game_info: GameInfo,
}

impl GameSnapshot {
    pub fn player(&self, name: &str) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.name == name)
    }
}

/// Serialize views as a `name -> view` object without reordering them
pub fn serialize_by_name<S: Serializer>(
    views: &[PlayerView],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(views.iter().map(|view| (&view.name, view)))
}

/// Result of an operation that changed a single player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerUpdate {
    pub player: PlayerName,
    pub for_effected: PlayerView,
    pub for_others: PlayerView,
    pub game_info: GameInfo,
}

impl Game {
    pub fn room_state(&self) -> RoomState {
        self.room_state
    }

    pub fn current_player(&self) -> Option<&str> {
        self.current_player.as_deref()
    }

    pub fn marshal(&self) -> Option<&str> {
        self.waiting_room_marshal.as_deref()
    }

    pub fn word_bounds(&self) -> (usize, usize) {
        (self.min_chars, self.max_chars)
    }

    pub fn turn_order(&self) -> &[PlayerName] {
        &self.turn_order
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_member(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.name == name)
    }

    pub fn player(&self, name: &str) -> GameResult<&Player> {
        self.players
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| GameError::PlayerNotFound(name.to_string()))
    }

    fn player_mut(&mut self, name: &str) -> GameResult<&mut Player> {
        self.players
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| GameError::PlayerNotFound(name.to_string()))
    }

    /// Members still in `playing` state, in turn order once the game has started
    pub fn remaining_players(&self) -> Vec<PlayerName> {
        if self.turn_order.is_empty() {
            return self
                .players
                .iter()
                .filter(|p| p.state == PlayerState::Playing)
                .map(|p| p.name.clone())
                .collect();
        }
        self.turn_order
            .iter()
            .filter(|name| self.is_playing(name))
            .cloned()
            .collect()
    }

    fn is_playing(&self, name: &str) -> bool {
        self.players
            .iter()
            .any(|p| p.name == name && p.state == PlayerState::Playing)
    }

    pub fn info(&self) -> GameInfo {
        GameInfo {
            room_state: self.room_state,
            current_player: self.current_player.clone(),
            waiting_room_marshal: self.waiting_room_marshal.clone(),
            remaining_players: self.remaining_players(),
            min_chars: self.min_chars,
            max_chars: self.max_chars,
        }
    }

    /// Room snapshot with the viewer's own record unmasked.
    ///
    /// `None` produces the public snapshot where every word is masked
    /// unless already disclosed.
    pub fn snapshot_for(&self, viewer: Option<&str>) -> GameSnapshot {
        GameSnapshot {
            players: self
                .players
                .iter()
                .map(|p| p.view_for(viewer))
                .collect(),
            game_info: self.info(),
        }
    }

    pub fn player_update(&self, name: &str) -> GameResult<PlayerUpdate> {
        let player = self.player(name)?;
        Ok(PlayerUpdate {
            player: player.name.clone(),
            for_effected: player.own_view(),
            for_others: player.others_view(),
            game_info: self.info(),
        })
    }

    fn require_phase(&self, phase: RoomState) -> GameResult<()> {
        if self.room_state != phase {
            return Err(GameError::WrongPhase(self.room_state));
        }
        Ok(())
    }

    fn require_marshal(&self, actor: &str, action: &'static str) -> GameResult<()> {
        if self.waiting_room_marshal.as_deref() != Some(actor) {
            return Err(GameError::NotMarshal(action));
        }
        Ok(())
    }

    /// Next remaining player after `name` in turn order, wrapping around.
    ///
    /// `name` itself may already be out of the game.
    fn next_in_turn_order(&self, name: &str) -> Option<PlayerName> {
        let len = self.turn_order.len();
        let start = self.turn_order.iter().position(|n| n == name)?;
        (1..=len)
            .map(|offset| &self.turn_order[(start + offset) % len])
            .find(|candidate| self.is_playing(candidate))
            .cloned()
    }

    /// Ends the game once fewer than 2 players remain. Returns the victor.
    fn settle_if_over(&mut self) -> Option<PlayerName> {
        if self.room_state != RoomState::Running {
            return None;
        }
        let remaining = self.remaining_players();
        if remaining.len() >= 2 {
            return None;
        }

        self.room_state = RoomState::Ended;
        self.current_player = None;
        let victor = remaining.into_iter().next()?;
        if let Ok(player) = self.player_mut(&victor) {
            player.state = PlayerState::Victor;
            player.disclose();
        }
        tracing::info!(victor = %victor, "game ended");
        Some(victor)
    }

    /// Handles a player leaving.
    ///
    /// In the waiting room the member is removed outright. Once the game has
    /// started the record stays, a `playing` member becomes `disconnected`
    /// with their word disclosed, and the turn or the game result is
    /// settled as if they had been eliminated.
    pub fn disconnect_player(&mut self, name: &str) -> GameResult<GameSnapshot> {
        match self.room_state {
            RoomState::WaitingRoom => {
                let index = self
                    .players
                    .iter()
                    .position(|p| p.name == name)
                    .ok_or_else(|| GameError::PlayerNotFound(name.to_string()))?;
                self.players.remove(index);

                if self.waiting_room_marshal.as_deref() == Some(name) {
                    self.waiting_room_marshal = self.players.first().map(|p| p.name.clone());
                    tracing::info!(
                        marshal = ?self.waiting_room_marshal,
                        "marshalship passed on after marshal left"
                    );
                }
            }
            RoomState::Running | RoomState::Ended => {
                let was_current = self.current_player.as_deref() == Some(name);
                let player = self.player_mut(name)?;
                if player.state == PlayerState::Playing {
                    player.state = PlayerState::Disconnected;
                    player.disclose();

                    if self.settle_if_over().is_none() && was_current {
                        self.current_player = self.next_in_turn_order(name);
                    }
                }
            }
        }

        Ok(self.snapshot_for(None))
    }
}
