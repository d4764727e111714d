use serde::{Deserialize, Serialize};

/// Room-scoped identifiers
pub type PlayerName = String;
pub type RoomName = String;
pub type ConnectionId = String;

/// Absolute bounds for the secret word length
pub const MIN_WORD_CHARS: usize = 1;
pub const MAX_WORD_CHARS: usize = 24;

/// Entries kept in `last_guessed_against` / `last_guessed_by`
pub const GUESS_HISTORY_CAP: usize = 5;

/// Consecutive guesses at one subject that trigger the anti-repetition rule
pub const REPEAT_WINDOW: usize = 3;

/// Above this many remaining players the anti-repetition rule applies
pub const REPEAT_RULE_MIN_REMAINING: usize = 3;

pub const PLACEHOLDER: char = '_';

pub const MAX_PLAYER_NAME_CHARS: usize = 32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RoomState {
    WaitingRoom,
    Running,
    Ended,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlayerState {
    Joined,
    Ready,
    Playing,
    Eliminated,
    Disconnected,
    Victor,
}

impl PlayerState {
    /// States in which a player's word is public
    pub fn discloses_word(self) -> bool {
        matches!(
            self,
            PlayerState::Eliminated | PlayerState::Disconnected | PlayerState::Victor
        )
    }

    pub fn in_waiting_room(self) -> bool {
        matches!(self, PlayerState::Joined | PlayerState::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_state_serializes_camel_case() {
        assert_eq!(
            serde_json::to_string(&RoomState::WaitingRoom).unwrap(),
            "\"waitingRoom\""
        );
        assert_eq!(
            serde_json::to_string(&PlayerState::Victor).unwrap(),
            "\"victor\""
        );
    }

    #[test]
    fn test_disclosing_states() {
        assert!(PlayerState::Eliminated.discloses_word());
        assert!(PlayerState::Disconnected.discloses_word());
        assert!(PlayerState::Victor.discloses_word());
        assert!(!PlayerState::Playing.discloses_word());
        assert!(!PlayerState::Joined.discloses_word());
        assert!(!PlayerState::Ready.discloses_word());
    }
}
