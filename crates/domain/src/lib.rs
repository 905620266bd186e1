//! Battlegrid Domain - Core combat rules and invariants
//!
//! This crate holds everything that is true about a combat encounter
//! independent of any transport or storage: the initiative tracker state
//! machine, per-combatant action economy, timed conditions, the fog-of-war
//! reveal set, and dice. There is no I/O and no async here; every mutation
//! goes through a validated transition that either applies fully and returns
//! a [`StateDelta`], or rejects with a [`CombatError`] and changes nothing.

pub mod combat;
pub mod dice;
pub mod error;
pub mod ids;
pub mod map;

pub use combat::{
    ActionEconomy, ActionSlot, Combatant, CombatantKind, CombatState, Condition,
    ConditionDuration, InitiativeAssignment, MoveUndo, StatBlock, StateDelta,
};
pub use dice::{RollOutcome, RollSpec};
pub use error::CombatError;
pub use ids::{CharacterId, CombatantId, RoomId, UserId};
pub use map::{BattleMap, GridCell};
