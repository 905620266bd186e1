//! Shared type definitions
//!
//! Common types used across the protocol that don't fit in other modules.

use serde::{Deserialize, Serialize};

/// Role of a participant in a game room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    /// Full visibility and control over room-wide state
    GameMaster,
    /// Filtered visibility; bound to at most one controlled combatant
    Player,
}

impl ParticipantRole {
    pub fn is_game_master(&self) -> bool {
        matches!(self, Self::GameMaster)
    }
}

/// Machine-readable error codes reported back to the originating connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The action is not allowed in the current combat state
    InvalidTransition,
    /// The actor lacks permission for the requested action
    Unauthorized,
    /// A referenced combatant, condition or character does not exist
    NotFound,
    /// The inbound message could not be parsed
    ParseError,
    /// The dice roll request was malformed
    InvalidRoll,
    /// The connection token was rejected
    InvalidToken,
    InternalError,
}
