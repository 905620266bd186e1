//! Connection registry
//!
//! Pure bookkeeping for live WebSocket connections: which room each one
//! belongs to, its viewer role, and its controlled-combatant binding. No
//! business logic lives here; the only validation is connection id
//! uniqueness. Connections own no combat data and are destroyed on
//! disconnect.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use battlegrid_domain::{CharacterId, RoomId, UserId};
use battlegrid_protocol::{ParticipantRole, ServerMessage};

/// Information about a connected client
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Unique ID for this connection
    pub connection_id: Uuid,
    pub user_id: UserId,
    pub username: String,
    /// The room this connection joined (fixed for the connection's lifetime)
    pub room_id: RoomId,
    pub role: ParticipantRole,
    /// The character this participant controls (if a player)
    pub controlled_id: Option<CharacterId>,
}

impl ConnectionInfo {
    pub fn is_game_master(&self) -> bool {
        self.role.is_game_master()
    }
}

/// Manages all active WebSocket connections
#[derive(Default)]
pub struct ConnectionManager {
    connections: RwLock<HashMap<Uuid, (ConnectionInfo, mpsc::Sender<ServerMessage>)>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection. Returns false if the id is already taken.
    pub async fn register(&self, info: ConnectionInfo, sender: mpsc::Sender<ServerMessage>) -> bool {
        let mut connections = self.connections.write().await;
        if connections.contains_key(&info.connection_id) {
            return false;
        }
        tracing::debug!(connection_id = %info.connection_id, room_id = %info.room_id, "Connection registered");
        connections.insert(info.connection_id, (info, sender));
        true
    }

    /// Unregister a connection, returning its info if it existed
    pub async fn unregister(&self, connection_id: Uuid) -> Option<ConnectionInfo> {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(&connection_id).map(|(info, _)| info);
        if removed.is_some() {
            tracing::debug!(connection_id = %connection_id, "Connection unregistered");
        }
        removed
    }

    pub async fn get(&self, connection_id: Uuid) -> Option<ConnectionInfo> {
        let connections = self.connections.read().await;
        connections
            .get(&connection_id)
            .map(|(info, _)| info.clone())
    }

    /// All connections in a room, with their senders
    pub async fn room_connections(
        &self,
        room_id: RoomId,
    ) -> Vec<(ConnectionInfo, mpsc::Sender<ServerMessage>)> {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|(info, _)| info.room_id == room_id)
            .cloned()
            .collect()
    }

    pub async fn room_is_empty(&self, room_id: RoomId) -> bool {
        let connections = self.connections.read().await;
        !connections.values().any(|(info, _)| info.room_id == room_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}
