pub mod handlers;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::auth::SessionClaims;
use crate::protocol::ServerMessage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler; the token is checked before upgrading
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let claims = match params.token.as_deref().map(|t| state.tokens.verify(t)) {
        Some(Ok(claims)) => claims,
        Some(Err(e)) => {
            tracing::warn!("WebSocket connection rejected: {}", e);
            return (StatusCode::UNAUTHORIZED, Json(ServerMessage::error(e))).into_response();
        }
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ServerMessage::error("Missing token")),
            )
                .into_response();
        }
    };

    tracing::info!(
        "WebSocket connection request: room={}, player={}",
        claims.room_name,
        claims.player_name
    );

    ws.on_upgrade(move |socket| handle_socket(socket, claims, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, claims: SessionClaims, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut outbound) = mpsc::unbounded_channel::<String>();

    let session = match handlers::connect(&state, claims, tx).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("WebSocket session refused: {}", e);
            if let Some(json) = ServerMessage::error(e).to_json() {
                let _ = sender.send(Message::Text(json.into())).await;
            }
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let mut ping = tokio::time::interval(state.config.ping_interval);
    // The first tick completes immediately
    ping.tick().await;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            // State updates queued by the broadcaster
            queued = outbound.recv() => {
                match queued {
                    Some(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    // Detached from the room (explicit disconnect or replaced)
                    None => break,
                }
            }

            // Liveness ping
            _ = ping.tick() => {
                if last_seen.elapsed() > state.config.pong_timeout {
                    tracing::warn!(
                        room = %session.room_name,
                        player = %session.player_name,
                        "connection timed out"
                    );
                    break;
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        if let Some(reply) = handlers::handle_text(&state, &session, text.as_str()).await {
                            if let Some(json) = reply.to_json() {
                                if sender.send(Message::Text(json.into())).await.is_err() {
                                    tracing::error!("Failed to send response");
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_seen = Instant::now();
                    }
                    Some(Ok(Message::Ping(data))) => {
                        last_seen = Instant::now();
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    if let Some(reply) = handlers::handle_disconnect(&state, &session).await {
        // Only reaches the client if the socket is still open
        if let Some(json) = reply.to_json() {
            let _ = sender.send(Message::Text(json.into())).await;
        }
    }

    tracing::info!(
        "WebSocket connection closed: room={}, player={}",
        session.room_name,
        session.player_name
    );
}
