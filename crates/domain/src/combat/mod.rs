//! Initiative tracker state machine and combat entities

mod combatant;
mod condition;
mod delta;
mod state;

pub use combatant::{ActionEconomy, ActionSlot, Combatant, CombatantKind, MoveUndo, StatBlock};
pub use condition::{Condition, ConditionDuration};
pub use delta::{InitiativeAssignment, StateDelta};
pub use state::CombatState;
