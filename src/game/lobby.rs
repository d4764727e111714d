//! Waiting-room operations: membership, word rules, readiness, start.

use rand::seq::SliceRandom;
use rand::Rng;

use super::{Game, GameInfo, GameSnapshot, Player, PlayerUpdate};
use crate::error::{GameError, GameResult};
use crate::types::*;

fn validate_bounds(min_chars: usize, max_chars: usize) -> GameResult<()> {
    if MIN_WORD_CHARS <= min_chars && min_chars <= max_chars && max_chars <= MAX_WORD_CHARS {
        Ok(())
    } else {
        Err(GameError::InvalidConstraint {
            min: min_chars,
            max: max_chars,
        })
    }
}

/// Trim a requested player name and check it is usable
pub fn normalize_name(raw: &str) -> GameResult<PlayerName> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(GameError::InvalidName("name is empty".to_string()));
    }
    if name.chars().count() > MAX_PLAYER_NAME_CHARS {
        return Err(GameError::InvalidName(format!(
            "name is longer than {} characters",
            MAX_PLAYER_NAME_CHARS
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(GameError::InvalidName(
            "name contains control characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

impl Game {
    /// Create a game in the waiting room with `creator` as its only member and marshal
    pub fn create(
        creator: &str,
        min_chars: usize,
        max_chars: usize,
    ) -> GameResult<(Game, PlayerUpdate)> {
        validate_bounds(min_chars, max_chars)?;
        let creator = normalize_name(creator)?;

        let game = Game {
            room_state: RoomState::WaitingRoom,
            players: vec![Player::new(creator.clone())],
            min_chars,
            max_chars,
            current_player: None,
            waiting_room_marshal: Some(creator.clone()),
            turn_order: Vec::new(),
        };
        let update = game.player_update(&creator)?;
        Ok((game, update))
    }

    pub fn add_player(&mut self, name: &str) -> GameResult<PlayerUpdate> {
        self.require_phase(RoomState::WaitingRoom)?;
        let name = normalize_name(name)?;
        if self.is_member(&name) {
            return Err(GameError::NameTaken(name));
        }

        self.players.push(Player::new(name.clone()));
        if self.waiting_room_marshal.is_none() {
            self.waiting_room_marshal = Some(name.clone());
        }
        self.player_update(&name)
    }

    /// Change the word length bounds.
    ///
    /// Members whose word no longer fits lose it and drop back to `joined`.
    pub fn change_word_constraints(
        &mut self,
        actor: &str,
        min_chars: usize,
        max_chars: usize,
    ) -> GameResult<GameSnapshot> {
        self.require_phase(RoomState::WaitingRoom)?;
        self.require_marshal(actor, "change word constraints")?;
        validate_bounds(min_chars, max_chars)?;

        self.min_chars = min_chars;
        self.max_chars = max_chars;

        for player in &mut self.players {
            let out_of_bounds = player
                .word_len()
                .is_some_and(|len| len < min_chars || len > max_chars);
            if out_of_bounds && player.state.in_waiting_room() {
                tracing::debug!(player = %player.name, "word cleared by new constraints");
                player.clear_word();
            }
        }

        Ok(self.snapshot_for(None))
    }

    /// Set the actor's secret word. Always leaves the actor `joined`.
    pub fn set_word(&mut self, actor: &str, raw_word: &str) -> GameResult<PlayerUpdate> {
        self.require_phase(RoomState::WaitingRoom)?;
        let (min, max) = (self.min_chars, self.max_chars);
        let player = self.player_mut(actor)?;
        if !player.state.in_waiting_room() {
            return Err(GameError::WrongState {
                player: player.name.clone(),
                state: player.state,
            });
        }

        let word = raw_word.trim().to_lowercase();
        let len = word.chars().count();
        let letters_only = !word.is_empty() && word.chars().all(|c| c.is_ascii_lowercase());
        if !letters_only || len < min || len > max {
            return Err(GameError::InvalidWord { min, max });
        }

        player.set_word(word);
        self.player_update(actor)
    }

    pub fn ready_up_toggle(&mut self, actor: &str) -> GameResult<PlayerUpdate> {
        self.require_phase(RoomState::WaitingRoom)?;
        let player = self.player_mut(actor)?;
        if player.word.is_none() {
            return Err(GameError::WordNotSet);
        }

        player.state = match player.state {
            PlayerState::Joined => PlayerState::Ready,
            PlayerState::Ready => PlayerState::Joined,
            state => {
                return Err(GameError::WrongState {
                    player: player.name.clone(),
                    state,
                })
            }
        };
        self.player_update(actor)
    }

    pub fn start(&mut self, actor: &str) -> GameResult<GameSnapshot> {
        self.start_with_rng(actor, &mut rand::rng())
    }

    /// Start the game with turn order drawn from `rng`
    pub fn start_with_rng<R: Rng + ?Sized>(
        &mut self,
        actor: &str,
        rng: &mut R,
    ) -> GameResult<GameSnapshot> {
        self.require_phase(RoomState::WaitingRoom)?;
        self.require_marshal(actor, "start the game")?;
        if self.players.len() < 2 {
            return Err(GameError::NotEnoughPlayers);
        }
        let not_ready: Vec<PlayerName> = self
            .players
            .iter()
            .filter(|p| p.state != PlayerState::Ready)
            .map(|p| p.name.clone())
            .collect();
        if !not_ready.is_empty() {
            return Err(GameError::PlayersNotReady(not_ready));
        }

        let mut order: Vec<PlayerName> = self.players.iter().map(|p| p.name.clone()).collect();
        order.shuffle(rng);

        for player in &mut self.players {
            player.state = PlayerState::Playing;
        }
        self.current_player = order.first().cloned();
        self.turn_order = order;
        self.room_state = RoomState::Running;

        tracing::info!(order = ?self.turn_order, "game started");
        Ok(self.snapshot_for(None))
    }

    pub fn transfer_marshalship(&mut self, actor: &str, subject: &str) -> GameResult<GameInfo> {
        self.require_phase(RoomState::WaitingRoom)?;
        self.require_marshal(actor, "transfer marshalship")?;
        if !self.is_member(subject) {
            return Err(GameError::PlayerNotFound(subject.to_string()));
        }

        self.waiting_room_marshal = Some(subject.to_string());
        Ok(self.info())
    }
}
