//! Unified error type for combat transitions
//!
//! Every state machine transition validates before mutating; a rejected
//! transition returns one of these variants and leaves the state untouched.

use thiserror::Error;

/// Rejection reasons for combat state transitions
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CombatError {
    /// The action is not allowed in the current state
    /// (e.g. advancing turns while no combat is running)
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// A referenced combatant or condition does not exist in this session
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A player-controlled combatant with this character is already present
    #[error("Combatant for character {0} is already in the encounter")]
    DuplicateCombatant(String),
}

impl CombatError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
