//! Action routing
//!
//! Every inbound action runs to completion while holding its room's lock.
//! The return value is a direct reply for the originating connection; all
//! other traffic goes out through [`crate::broadcast`].

use crate::auth::SessionClaims;
use crate::broadcast;
use crate::error::{GameError, GameResult};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::{ClientHandle, Room};
use crate::state::AppState;
use crate::types::*;
use tokio::sync::mpsc;

/// A connection bound to `(room, player)` by a verified token
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub room_name: RoomName,
    pub player_name: PlayerName,
    pub connection_id: ConnectionId,
}

/// Attach a new connection to its room.
///
/// An older connection for the same player is replaced; its eventual
/// closure is then ignored.
pub async fn connect(
    state: &AppState,
    claims: SessionClaims,
    tx: mpsc::UnboundedSender<String>,
) -> GameResult<Session> {
    let room = state.rooms.require(&claims.room_name).await?;
    let mut room = room.lock().await;
    if room.retired {
        return Err(GameError::RoomNotFound(claims.room_name));
    }
    // Issued for an earlier room under the same name
    if claims.room_id != room.id {
        return Err(GameError::InvalidToken);
    }

    let player = room.game.player(&claims.player_name)?;
    if player.state == PlayerState::Disconnected {
        return Err(GameError::WrongState {
            player: player.name.clone(),
            state: player.state,
        });
    }

    let handle = ClientHandle::new(tx);
    let session = Session {
        room_name: claims.room_name,
        player_name: claims.player_name,
        connection_id: handle.connection_id.clone(),
    };
    if room.attach(&session.player_name, handle).is_some() {
        tracing::info!(
            room = %session.room_name,
            player = %session.player_name,
            "replaced existing connection"
        );
    }
    tracing::info!(room = %session.room_name, player = %session.player_name, "client connected");
    Ok(session)
}

/// Parse and dispatch one text frame
pub async fn handle_text(state: &AppState, session: &Session, text: &str) -> Option<ServerMessage> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => handle_message(msg, session, state).await,
        Err(e) => {
            tracing::warn!(player = %session.player_name, "Failed to parse client message: {}", e);
            Some(ServerMessage::error(GameError::Malformed(e.to_string())))
        }
    }
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    session: &Session,
    state: &AppState,
) -> Option<ServerMessage> {
    tracing::debug!(
        room = %session.room_name,
        player = %session.player_name,
        action = msg.name(),
        "action received"
    );

    if msg == ClientMessage::Disconnect {
        return handle_disconnect(state, session).await;
    }

    let room = match state.rooms.require(&session.room_name).await {
        Ok(room) => room,
        Err(e) => return Some(ServerMessage::error(e)),
    };
    let mut room = room.lock().await;
    if room.retired {
        return Some(ServerMessage::error(GameError::RoomNotFound(
            session.room_name.clone(),
        )));
    }

    let actor = session.player_name.as_str();
    let result = match msg {
        ClientMessage::Join => handle_join(&room, actor),
        ClientMessage::SetWord { word } => handle_set_word(&mut room, actor, &word),
        ClientMessage::ReadyToggle => handle_ready_toggle(&mut room, actor),
        ClientMessage::ChangeWordConstraints {
            min_chars,
            max_chars,
        } => handle_change_word_constraints(&mut room, actor, min_chars, max_chars),
        ClientMessage::TransferMarshalship { subject } => {
            handle_transfer_marshalship(&mut room, actor, &subject)
        }
        ClientMessage::StartGame => {
            // Everyone sees why the game could not begin
            if let Err(e) = handle_start(&mut room, actor) {
                tracing::warn!(room = %session.room_name, "start rejected: {}", e);
                broadcast::send_to_room(&room, &ServerMessage::error(&e), &[]);
            }
            return None;
        }
        ClientMessage::Guess { subject, guess } => handle_guess(&mut room, actor, &subject, &guess),
        ClientMessage::GetGameState => {
            return match room.game.player(actor) {
                Ok(_) => Some(ServerMessage::snapshot(room.game.snapshot_for(Some(actor)))),
                Err(e) => Some(ServerMessage::error(e)),
            };
        }
        ClientMessage::Disconnect => return None,
    };

    match result {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!(
                room = %session.room_name,
                player = %actor,
                kind = ?e.kind(),
                "action rejected: {}",
                e
            );
            Some(ServerMessage::error(e))
        }
    }
}

fn handle_join(room: &Room, actor: &str) -> GameResult<()> {
    let update = room.game.player_update(actor)?;
    broadcast::send_player_update(room, &update);
    tracing::info!(room = %room.name, player = %actor, "player joined");
    Ok(())
}

fn handle_set_word(room: &mut Room, actor: &str, word: &str) -> GameResult<()> {
    let update = room.game.set_word(actor, word)?;
    broadcast::send_player_update(room, &update);
    Ok(())
}

fn handle_ready_toggle(room: &mut Room, actor: &str) -> GameResult<()> {
    let update = room.game.ready_up_toggle(actor)?;
    broadcast::send_player_update(room, &update);
    Ok(())
}

fn handle_change_word_constraints(
    room: &mut Room,
    actor: &str,
    min_chars: usize,
    max_chars: usize,
) -> GameResult<()> {
    room.game
        .change_word_constraints(actor, min_chars, max_chars)?;
    broadcast::send_snapshots(room);
    Ok(())
}

fn handle_transfer_marshalship(room: &mut Room, actor: &str, subject: &str) -> GameResult<()> {
    let game_info = room.game.transfer_marshalship(actor, subject)?;
    broadcast::send_to_room(room, &ServerMessage::GameInfo { game_info }, &[]);
    tracing::info!(room = %room.name, from = %actor, to = %subject, "marshalship transferred");
    Ok(())
}

fn handle_start(room: &mut Room, actor: &str) -> GameResult<()> {
    room.game.start(actor)?;
    broadcast::send_snapshots(room);
    Ok(())
}

fn handle_guess(room: &mut Room, actor: &str, subject: &str, guess: &str) -> GameResult<()> {
    let outcome = room.game.guess(actor, subject, guess)?;
    broadcast::send_guess_result(room, &outcome);
    tracing::info!(room = %room.name, "{}", outcome.stream_info);

    // A self-elimination can crown a player the guess result doesn't cover
    if let Some(victor) = outcome.victor.as_deref() {
        if victor != outcome.actor && victor != outcome.subject {
            let update = room.game.player_update(victor)?;
            broadcast::send_player_update(room, &update);
        }
    }
    Ok(())
}

/// Disconnect path, shared by the `disconnect` action and connection closure.
///
/// Only the connection currently registered for the player can disconnect
/// them. The room is dropped once its last client is gone.
pub async fn handle_disconnect(state: &AppState, session: &Session) -> Option<ServerMessage> {
    let room = state.rooms.get(&session.room_name).await?;
    let reply = {
        let mut room = room.lock().await;
        if !room.detach(&session.player_name, &session.connection_id) {
            return None;
        }
        tracing::info!(
            room = %session.room_name,
            player = %session.player_name,
            "client disconnected"
        );

        match room.game.disconnect_player(&session.player_name) {
            Ok(_) => {
                broadcast::send_snapshots(&room);
                None
            }
            Err(e) => {
                tracing::warn!(player = %session.player_name, "disconnect failed: {}", e);
                Some(ServerMessage::error(e))
            }
        }
    };

    state.rooms.remove_if_empty(&session.room_name).await;
    reply
}
