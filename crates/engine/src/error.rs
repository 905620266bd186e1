//! Engine-level error type and wire error mapping

use thiserror::Error;

use battlegrid_domain::dice::RollError;
use battlegrid_domain::{CharacterId, CombatError};
use battlegrid_protocol::ErrorCode;

/// Errors produced while handling a single inbound action.
///
/// Every variant is local to the action that caused it and is reported only
/// to the originating connection.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Combat(#[from] CombatError),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Character not found: {0}")]
    CharacterNotFound(CharacterId),

    #[error(transparent)]
    Roll(#[from] RollError),

    #[error("Character store error: {0}")]
    Store(String),

    #[error("No active room for this connection")]
    RoomGone,
}

impl EngineError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Map to the machine-readable code reported on the wire
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Combat(CombatError::InvalidTransition(_)) => ErrorCode::InvalidTransition,
            Self::Combat(CombatError::DuplicateCombatant(_)) => ErrorCode::InvalidTransition,
            Self::Combat(CombatError::NotFound { .. }) => ErrorCode::NotFound,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::CharacterNotFound(_) => ErrorCode::NotFound,
            Self::Roll(_) => ErrorCode::InvalidRoll,
            Self::Store(_) | Self::RoomGone => ErrorCode::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combat_rejections_map_to_invalid_transition() {
        let err = EngineError::from(CombatError::invalid("no combat"));
        assert_eq!(err.code(), ErrorCode::InvalidTransition);
    }

    #[test]
    fn test_not_found_mapping() {
        let err = EngineError::from(CombatError::not_found("Combatant", "x"));
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_unauthorized_mapping() {
        assert_eq!(
            EngineError::unauthorized("nope").code(),
            ErrorCode::Unauthorized
        );
    }
}
