use serde::{Deserialize, Serialize};
use crate::game::{serialize_by_name, GameInfo, GameSnapshot, GuessOutcome, PlayerUpdate, PlayerView};
use crate::types::*;

/// Inbound action, one per WebSocket text frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join,
    Disconnect,
    ChangeWordConstraints { min_chars: usize, max_chars: usize },
    TransferMarshalship { subject: PlayerName },
    SetWord { word: String },
    ReadyToggle,
    StartGame,
    Guess { subject: PlayerName, guess: String },
    GetGameState,
}

impl ClientMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::Join => "join",
            ClientMessage::Disconnect => "disconnect",
            ClientMessage::ChangeWordConstraints { .. } => "changeWordConstraints",
            ClientMessage::TransferMarshalship { .. } => "transferMarshalship",
            ClientMessage::SetWord { .. } => "setWord",
            ClientMessage::ReadyToggle => "readyToggle",
            ClientMessage::StartGame => "startGame",
            ClientMessage::Guess { .. } => "guess",
            ClientMessage::GetGameState => "getGameState",
        }
    }
}

/// One side of a player update; only the projection meant for the recipient is set
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_effected: Option<PlayerView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_others: Option<PlayerView>,
}

impl ViewUpdate {
    pub fn effected(view: PlayerView) -> Self {
        Self {
            for_effected: Some(view),
            for_others: None,
        }
    }

    pub fn others(view: PlayerView) -> Self {
        Self {
            for_effected: None,
            for_others: Some(view),
        }
    }
}

/// Outbound payloads. Untagged: clients tell them apart by their keys.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Snapshot {
        #[serde(serialize_with = "serialize_by_name")]
        players: Vec<PlayerView>,
        game_info: GameInfo,
    },
    #[serde(rename_all = "camelCase")]
    PlayerUpdate {
        #[serde(flatten)]
        update: ViewUpdate,
        game_info: GameInfo,
    },
    #[serde(rename_all = "camelCase")]
    GuessResult {
        actor_update: ViewUpdate,
        subject_update: ViewUpdate,
        stream_info: String,
        game_info: GameInfo,
    },
    #[serde(rename_all = "camelCase")]
    GameInfo { game_info: GameInfo },
    Error { error: String },
}

impl ServerMessage {
    pub fn error(message: impl ToString) -> Self {
        ServerMessage::Error {
            error: message.to_string(),
        }
    }

    pub fn snapshot(snapshot: GameSnapshot) -> Self {
        ServerMessage::Snapshot {
            players: snapshot.players,
            game_info: snapshot.game_info,
        }
    }

    /// Own view for the affected player
    pub fn for_effected(update: &PlayerUpdate) -> Self {
        ServerMessage::PlayerUpdate {
            update: ViewUpdate::effected(update.for_effected.clone()),
            game_info: update.game_info.clone(),
        }
    }

    /// Others view for everyone else in the room
    pub fn for_others(update: &PlayerUpdate) -> Self {
        ServerMessage::PlayerUpdate {
            update: ViewUpdate::others(update.for_others.clone()),
            game_info: update.game_info.clone(),
        }
    }

    /// The guess result as seen by `recipient` (`None` for bystanders)
    pub fn guess_result_for(outcome: &GuessOutcome, recipient: Option<&str>) -> Self {
        let actor_update = if recipient == Some(outcome.actor.as_str()) {
            ViewUpdate::effected(outcome.actor_own.clone())
        } else {
            ViewUpdate::others(outcome.actor_others.clone())
        };
        let subject_update = if recipient == Some(outcome.subject.as_str()) {
            ViewUpdate::effected(outcome.subject_own.clone())
        } else {
            ViewUpdate::others(outcome.subject_others.clone())
        };
        ServerMessage::GuessResult {
            actor_update,
            subject_update,
            stream_info: outcome.stream_info.clone(),
            game_info: outcome.game_info.clone(),
        }
    }

    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!("Failed to serialize server message: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_actions() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"action":"guess","subject":"Will","guess":"o"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Guess {
                subject: "Will".to_string(),
                guess: "o".to_string()
            }
        );

        let msg: ClientMessage =
            serde_json::from_str(r#"{"action":"changeWordConstraints","minChars":3,"maxChars":8}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::ChangeWordConstraints {
                min_chars: 3,
                max_chars: 8
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"action":"readyToggle"}"#).unwrap();
        assert_eq!(msg, ClientMessage::ReadyToggle);
    }

    #[test]
    fn test_reject_malformed_actions() {
        for raw in [
            r#"{"action":"fly"}"#,
            r#"{"action":"guess","subject":"Will"}"#,
            r#"{"action":"setWord","word":5}"#,
            r#"{"action":"changeWordConstraints","minChars":-1,"maxChars":3}"#,
            r#"{"subject":"Will"}"#,
            "not json",
        ] {
            assert!(
                serde_json::from_str::<ClientMessage>(raw).is_err(),
                "{raw} should not parse"
            );
        }
    }

    #[test]
    fn test_error_shape() {
        let value = serde_json::to_value(ServerMessage::error("nope")).unwrap();
        assert_eq!(value, json!({ "error": "nope" }));
    }

    #[test]
    fn test_player_update_shapes() {
        let (game, update) = crate::game::Game::create("Steve", 1, 24).unwrap();
        let own = serde_json::to_value(ServerMessage::for_effected(&update)).unwrap();
        assert!(own.get("forEffected").is_some());
        assert!(own.get("forOthers").is_none());
        assert_eq!(own["gameInfo"]["roomState"], "waitingRoom");

        let others = serde_json::to_value(ServerMessage::for_others(&update)).unwrap();
        assert!(others.get("forOthers").is_some());
        assert!(others.get("forEffected").is_none());

        let info = serde_json::to_value(ServerMessage::GameInfo {
            game_info: game.info(),
        })
        .unwrap();
        assert_eq!(info["gameInfo"]["waitingRoomMarshal"], "Steve");
    }
}
