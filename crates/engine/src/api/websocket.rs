//! WebSocket handling for room connections
//!
//! One socket per room membership: clients connect to
//! `/ws/rooms/{room_id}?token=...`, the token is verified before the upgrade,
//! and the connection receives a filtered snapshot immediately so reconnects
//! never depend on missed deltas.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use battlegrid_domain::RoomId;
use battlegrid_protocol::{ClientMessage, ErrorCode, ServerMessage};

use crate::api::connections::ConnectionInfo;
use crate::api::handlers::{self, ConnectionContext};
use crate::app::App;
use crate::ports::AccessClaims;
use crate::visibility;

/// Buffer size for the per-connection outbound channel. A connection that
/// falls this far behind starts losing messages (and recovers via snapshot
/// on reconnect) rather than slowing the room down.
const CONNECTION_CHANNEL_BUFFER: usize = 256;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    token: String,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<Uuid>,
    Query(params): Query<WsParams>,
    State(app): State<Arc<App>>,
) -> Response {
    match app.tokens.verify(&params.token).await {
        Ok(claims) => {
            let room_id = RoomId::from_uuid(room_id);
            ws.on_upgrade(move |socket| handle_socket(socket, app, room_id, claims))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Rejected WebSocket connection");
            (StatusCode::UNAUTHORIZED, "invalid token").into_response()
        }
    }
}

/// Drive one WebSocket connection from registration to teardown
async fn handle_socket(socket: WebSocket, app: Arc<App>, room_id: RoomId, claims: AccessClaims) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let connection_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(CONNECTION_CHANNEL_BUFFER);

    let info = ConnectionInfo {
        connection_id,
        user_id: claims.user_id,
        username: claims.username.clone(),
        room_id,
        role: claims.role,
        controlled_id: claims.controlled_id,
    };
    if !app.connections.register(info, tx.clone()).await {
        return;
    }
    let room = app.rooms.get_or_create(room_id);

    tracing::info!(
        connection_id = %connection_id,
        room_id = %room_id,
        user = %claims.username,
        role = ?claims.role,
        "WebSocket connection established"
    );

    // Forward messages from the channel to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "Failed to serialize server message"),
            }
        }
    });

    // Snapshot-on-connect, filtered for this viewer
    let snapshot = room.snapshot().await;
    let view = visibility::snapshot_view(&snapshot, claims.role, claims.controlled_id);
    if tx.send(ServerMessage::RoomSnapshot { view }).await.is_err() {
        tracing::warn!(connection_id = %connection_id, "Connection closed before snapshot");
    }

    // Presence announcement to the rest of the room
    app.router
        .publish_except(
            room_id,
            &ServerMessage::UserConnected {
                user_id: claims.user_id,
                username: claims.username.clone(),
                role: claims.role,
            },
            connection_id,
        )
        .await;

    let ctx = ConnectionContext {
        connection_id,
        room_id,
        claims,
    };

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => {
                    if let Some(reply) = handlers::handle_message(&app, &ctx, msg).await {
                        if tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "Failed to parse message");
                    let error = ServerMessage::Error {
                        code: ErrorCode::ParseError,
                        message: format!("Invalid message format: {e}"),
                    };
                    if tx.send(error).await.is_err() {
                        break;
                    }
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!(connection_id = %connection_id, "WebSocket closed by client");
                break;
            }
            Ok(Message::Ping(_)) => {
                let _ = tx.send(ServerMessage::Pong).await;
            }
            Err(e) => {
                tracing::error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Teardown: the combatant (if any) stays in the room until explicitly
    // removed; only the registry entry goes away
    if let Some(info) = app.connections.unregister(connection_id).await {
        app.router
            .publish_message(
                room_id,
                &ServerMessage::UserDisconnected {
                    user_id: info.user_id,
                    username: info.username,
                },
            )
            .await;
        if app.connections.room_is_empty(room_id).await {
            app.rooms.mark_idle(room_id);
        }
    }
    send_task.abort();

    tracing::info!(connection_id = %connection_id, "WebSocket connection terminated");
}
