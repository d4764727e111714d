use crate::types::{PlayerName, PlayerState, RoomName, RoomState};

/// Result type for game and session operations
pub type GameResult<T> = Result<T, GameError>;

/// Broad failure categories, used to pick HTTP status codes and log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    WrongPhase,
    WrongState,
    Unauthorized,
    NotFound,
    Conflict,
    RepeatedTargetBlocked,
    InvalidToken,
}

/// Errors that can occur while handling a room or game operation.
///
/// The `Display` text is what clients receive as `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Word length bounds must satisfy 1 <= minChars <= maxChars <= 24 (got {min}..{max})")]
    InvalidConstraint { min: usize, max: usize },

    #[error("Word must be {min} to {max} letters a-z")]
    InvalidWord { min: usize, max: usize },

    #[error("Guess must be one or more letters a-z")]
    InvalidGuess,

    #[error("Invalid player name: {0}")]
    InvalidName(String),

    #[error("Name {0} is already taken in this room")]
    NameTaken(PlayerName),

    #[error("Room {0} already exists")]
    RoomExists(RoomName),

    #[error("Room {0} not found")]
    RoomNotFound(RoomName),

    #[error("Player {0} not found")]
    PlayerNotFound(PlayerName),

    #[error("Action not allowed while the room is {0:?}")]
    WrongPhase(RoomState),

    #[error("Action not allowed for {player} while {state:?}")]
    WrongState {
        player: PlayerName,
        state: PlayerState,
    },

    #[error("Set a word before readying up")]
    WordNotSet,

    #[error("Only the marshal can {0}")]
    NotMarshal(&'static str),

    #[error("It is {0}'s turn")]
    NotYourTurn(PlayerName),

    #[error("{0} is not a valid target")]
    InvalidTarget(PlayerName),

    #[error("At least 2 players are needed to start")]
    NotEnoughPlayers,

    #[error("Players not ready: {}", .0.join(", "))]
    PlayersNotReady(Vec<PlayerName>),

    #[error("You cannot guess against {0} more than 3 times in a row")]
    RepeatedTargetBlocked(PlayerName),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid message format: {0}")]
    Malformed(String),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::InvalidConstraint { .. }
            | GameError::InvalidWord { .. }
            | GameError::InvalidGuess
            | GameError::InvalidName(_)
            | GameError::Malformed(_) => ErrorKind::Validation,
            GameError::NameTaken(_) | GameError::RoomExists(_) => ErrorKind::Conflict,
            GameError::RoomNotFound(_) | GameError::PlayerNotFound(_) => ErrorKind::NotFound,
            GameError::WrongPhase(_) => ErrorKind::WrongPhase,
            GameError::WrongState { .. }
            | GameError::WordNotSet
            | GameError::InvalidTarget(_)
            | GameError::NotEnoughPlayers
            | GameError::PlayersNotReady(_) => ErrorKind::WrongState,
            GameError::NotMarshal(_) | GameError::NotYourTurn(_) => ErrorKind::Unauthorized,
            GameError::RepeatedTargetBlocked(_) => ErrorKind::RepeatedTargetBlocked,
            GameError::InvalidToken => ErrorKind::InvalidToken,
        }
    }
}
