//! Application state and composition
//!
//! [`App`] holds the managers and collaborator ports; it is shared as axum
//! state across HTTP and WebSocket handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::api::connections::ConnectionManager;
use crate::broadcast::BroadcastRouter;
use crate::ports::{AccessTokenVerifier, Catalog, CharacterStore, DiceRoller};
use crate::rooms::RoomManager;

/// Runtime configuration, read from the environment with defaults
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub host: String,
    pub port: u16,
    /// How long an empty room's state is retained for reconnects
    pub room_grace: Duration,
    pub map_width: u32,
    pub map_height: u32,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("SERVER_PORT")
            .or_else(|_| std::env::var("PORT"))
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(3000);
        let grace_secs: u64 = std::env::var("ROOM_GRACE_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(300);
        let map_width: u32 = std::env::var("MAP_WIDTH")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(20);
        let map_height: u32 = std::env::var("MAP_HEIGHT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(15);
        Self {
            host,
            port,
            room_grace: Duration::from_secs(grace_secs),
            map_width,
            map_height,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            room_grace: Duration::from_secs(300),
            map_width: 20,
            map_height: 15,
        }
    }
}

/// Main application state
pub struct App {
    pub config: EngineConfig,
    pub connections: Arc<ConnectionManager>,
    pub rooms: RoomManager,
    pub router: BroadcastRouter,
    pub characters: Arc<dyn CharacterStore>,
    pub catalog: Arc<dyn Catalog>,
    pub tokens: Arc<dyn AccessTokenVerifier>,
    pub dice: Arc<dyn DiceRoller>,
}

impl App {
    /// Create a new App with all dependencies wired up
    pub fn new(
        config: EngineConfig,
        characters: Arc<dyn CharacterStore>,
        catalog: Arc<dyn Catalog>,
        tokens: Arc<dyn AccessTokenVerifier>,
        dice: Arc<dyn DiceRoller>,
    ) -> Self {
        let connections = Arc::new(ConnectionManager::new());
        let rooms = RoomManager::new(Arc::clone(&dice), config.map_width, config.map_height);
        let router = BroadcastRouter::new(Arc::clone(&connections));
        Self {
            config,
            connections,
            rooms,
            router,
            characters,
            catalog,
            tokens,
            dice,
        }
    }
}
