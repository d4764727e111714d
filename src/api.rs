//! HTTP endpoints for room discovery, creation and joining.
//!
//! These only set up membership and hand out session tokens; everything
//! after that happens over the WebSocket.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::{ErrorKind, GameError, GameResult};
use crate::game::{normalize_name, Game, GameInfo, PlayerUpdate, PlayerView};
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::*;
use crate::ws;

const NAME_SUGGESTION_ATTEMPTS: usize = 16;

/// All HTTP and WebSocket routes
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/rooms/{name}", get(get_room).post(create_room))
        .route("/rooms/{name}/players", put(join_room))
        .route("/room-names/suggest", get(suggest_room_name))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::WrongPhase | ErrorKind::WrongState | ErrorKind::Conflict => {
                StatusCode::CONFLICT
            }
            ErrorKind::Unauthorized | ErrorKind::RepeatedTargetBlocked => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidToken => StatusCode::UNAUTHORIZED,
        };
        (status, Json(ServerMessage::error(self))).into_response()
    }
}

/// Public summary of a room
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_state: RoomState,
    pub player_count: usize,
}

/// Returned on create/join: the session token plus the caller's own view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub token: String,
    pub player: PlayerView,
    pub game_info: GameInfo,
}

impl JoinResponse {
    fn new(token: String, update: PlayerUpdate) -> Self {
        Self {
            token,
            player: update.for_effected,
            game_info: update.game_info,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomQuery {
    pub creator_name: String,
    pub min_chars: Option<usize>,
    pub max_chars: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomQuery {
    pub player_name: String,
}

#[derive(Debug, Serialize)]
pub struct RoomNameSuggestion {
    pub name: RoomName,
}

/// GET /rooms/{name}
///
/// `null` if the room does not exist
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(name): Path<RoomName>,
) -> Json<Option<RoomSummary>> {
    let Ok(name) = normalize_name(&name) else {
        return Json(None);
    };
    let Some(room) = state.rooms.get(&name).await else {
        return Json(None);
    };
    let room = room.lock().await;
    Json(Some(RoomSummary {
        room_state: room.game.room_state(),
        player_count: room.game.player_count(),
    }))
}

/// POST /rooms/{name}?creatorName=&minChars=&maxChars=
///
/// The game is validated before the room is registered, so a bad request
/// never leaves a room behind.
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Path(name): Path<RoomName>,
    Query(query): Query<CreateRoomQuery>,
) -> GameResult<(StatusCode, Json<JoinResponse>)> {
    let name = normalize_name(&name)?;
    let (game, update) = Game::create(
        &query.creator_name,
        query.min_chars.unwrap_or(MIN_WORD_CHARS),
        query.max_chars.unwrap_or(MAX_WORD_CHARS),
    )?;
    // Rooms nobody connects to are dropped by the sweeper after `room_claim_grace`
    let room = state.rooms.create(&name, game).await?;
    let room_id = room.lock().await.id.clone();

    let token = state.tokens.issue(&name, &room_id, &update.player);
    tracing::info!(room = %name, creator = %update.player, "game created");
    Ok((StatusCode::CREATED, Json(JoinResponse::new(token, update))))
}

/// PUT /rooms/{name}/players?playerName=
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    Path(name): Path<RoomName>,
    Query(query): Query<JoinRoomQuery>,
) -> GameResult<Json<JoinResponse>> {
    let name = normalize_name(&name)?;
    let room = state.rooms.require(&name).await?;
    let (room_id, update) = {
        let mut room = room.lock().await;
        if room.retired {
            return Err(GameError::RoomNotFound(name));
        }
        let update = room.game.add_player(&query.player_name)?;
        (room.id.clone(), update)
    };

    let token = state.tokens.issue(&name, &room_id, &update.player);
    tracing::info!(room = %name, player = %update.player, "player added");
    Ok(Json(JoinResponse::new(token, update)))
}

/// GET /room-names/suggest
///
/// A two-word name that is not currently in use
pub async fn suggest_room_name(State(state): State<Arc<AppState>>) -> Json<RoomNameSuggestion> {
    for _ in 0..NAME_SUGGESTION_ATTEMPTS {
        if let Some(name) = petname::petname(2, "-") {
            if !state.rooms.contains(&name).await {
                return Json(RoomNameSuggestion { name });
            }
        }
    }

    let base = petname::petname(2, "-").unwrap_or_else(|| "room".to_string());
    let mut suffix = 2;
    loop {
        let name = format!("{}-{}", base, suffix);
        if !state.rooms.contains(&name).await {
            return Json(RoomNameSuggestion { name });
        }
        suffix += 1;
    }
}
