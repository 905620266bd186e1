//! Shared fixtures for engine tests

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use battlegrid_domain::{CharacterId, RoomId, UserId};
use battlegrid_protocol::{ParticipantRole, ServerMessage};

use crate::api::connections::ConnectionInfo;
use crate::app::{App, EngineConfig};
use crate::ports::{DevTokenVerifier, DiceRoller, InMemoryCharacterStore, StaticCatalog};

/// Deterministic dice: every roll returns the same value
pub struct FixedDice(pub u32);

impl DiceRoller for FixedDice {
    fn roll(&self, _sides: u32) -> u32 {
        self.0
    }
}

/// An App wired with in-memory ports and fixed dice
pub fn test_app(dice_value: u32) -> (Arc<App>, Arc<InMemoryCharacterStore>) {
    let characters = Arc::new(InMemoryCharacterStore::new());
    let app = App::new(
        EngineConfig::default(),
        Arc::clone(&characters) as Arc<dyn crate::ports::CharacterStore>,
        Arc::new(StaticCatalog),
        Arc::new(DevTokenVerifier),
        Arc::new(FixedDice(dice_value)),
    );
    (Arc::new(app), characters)
}

/// A registered test connection with its receiving end
pub struct TestConnection {
    pub info: ConnectionInfo,
    pub rx: mpsc::Receiver<ServerMessage>,
}

impl TestConnection {
    /// Drain everything currently queued
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            messages.push(msg);
        }
        messages
    }
}

/// Register a connection directly with the registry, bypassing the socket
pub async fn join_room(
    app: &App,
    room_id: RoomId,
    role: ParticipantRole,
    controlled_id: Option<CharacterId>,
) -> TestConnection {
    let (tx, rx) = mpsc::channel(64);
    let info = ConnectionInfo {
        connection_id: Uuid::new_v4(),
        user_id: UserId::new(),
        username: "tester".to_string(),
        room_id,
        role,
        controlled_id,
    };
    assert!(app.connections.register(info.clone(), tx).await);
    app.rooms.get_or_create(room_id);
    TestConnection { info, rx }
}
