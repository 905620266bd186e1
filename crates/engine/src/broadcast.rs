//! Broadcast router
//!
//! Fans filtered messages out to a room's connections. Delivery is
//! fire-and-forget: a full or closed per-connection channel is logged and
//! skipped, never retried, and never affects combat state or delivery to
//! other connections. A client that missed messages recovers through the
//! snapshot it receives on reconnect.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use battlegrid_domain::{CharacterId, RoomId, StateDelta, UserId};
use battlegrid_protocol::{ParticipantRole, ServerMessage};
use uuid::Uuid;

use crate::api::connections::{ConnectionInfo, ConnectionManager};
use crate::rooms::RoomStateSnapshot;
use crate::visibility;

/// Distinct visibility identity within a room. Filtering is a pure function
/// of `(state, role, controlled_id)`, so connections sharing a key share one
/// filter evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ViewKey {
    role: ParticipantRole,
    controlled_id: Option<CharacterId>,
}

impl ViewKey {
    fn of(info: &ConnectionInfo) -> Self {
        Self {
            role: info.role,
            controlled_id: info.controlled_id,
        }
    }
}

pub struct BroadcastRouter {
    connections: Arc<ConnectionManager>,
}

impl BroadcastRouter {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    /// Deliver a state delta to every connection in the room, filtered once
    /// per distinct viewer key.
    pub async fn publish_delta(
        &self,
        room_id: RoomId,
        delta: &StateDelta,
        snapshot: &RoomStateSnapshot,
    ) {
        let connections = self.connections.room_connections(room_id).await;
        let mut filtered: HashMap<ViewKey, Option<ServerMessage>> = HashMap::new();

        for (info, sender) in &connections {
            let key = ViewKey::of(info);
            let message = filtered.entry(key).or_insert_with(|| {
                visibility::delta_view(delta, snapshot, key.role, key.controlled_id)
                    .map(|view| ServerMessage::CombatUpdate { delta: view })
            });
            if let Some(message) = message {
                send(info, sender, message.clone());
            }
        }
    }

    /// Deliver an unfiltered message to every connection in the room
    pub async fn publish_message(&self, room_id: RoomId, message: &ServerMessage) {
        for (info, sender) in self.connections.room_connections(room_id).await {
            send(&info, &sender, message.clone());
        }
    }

    /// Deliver to every connection in the room except one (presence echoes)
    pub async fn publish_except(&self, room_id: RoomId, message: &ServerMessage, exclude: Uuid) {
        for (info, sender) in self.connections.room_connections(room_id).await {
            if info.connection_id != exclude {
                send(&info, &sender, message.clone());
            }
        }
    }

    /// Whisper delivery: game master connections plus every connection of
    /// the originating user, bypassing the room broadcast entirely.
    pub async fn publish_targeted(
        &self,
        room_id: RoomId,
        message: &ServerMessage,
        origin: UserId,
    ) {
        for (info, sender) in self.connections.room_connections(room_id).await {
            if info.is_game_master() || info.user_id == origin {
                send(&info, &sender, message.clone());
            }
        }
    }
}

fn send(info: &ConnectionInfo, sender: &mpsc::Sender<ServerMessage>, message: ServerMessage) {
    if let Err(e) = sender.try_send(message) {
        tracing::warn!(
            connection_id = %info.connection_id,
            error = %e,
            "Dropping message to slow or closed connection"
        );
    }
}
