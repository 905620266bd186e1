//! Change descriptions emitted by combat transitions
//!
//! Every successful transition returns exactly one delta describing what
//! changed, so the engine can route a small message instead of re-sending the
//! whole state on every micro-mutation. Deltas are wire-ready: the broadcast
//! layer serializes them as-is after visibility filtering.

use serde::{Deserialize, Serialize};

use crate::ids::CombatantId;
use crate::map::GridCell;

use super::combatant::{ActionSlot, Combatant};
use super::condition::Condition;

/// One initiative value assignment inside an [`StateDelta::InitiativeChanged`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeAssignment {
    pub combatant_id: CombatantId,
    pub initiative: i32,
}

/// What a single transition changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateDelta {
    CombatStarted {
        round: u32,
        turn_index: usize,
        combatants: Vec<Combatant>,
    },
    CombatEnded,
    CombatantAdded {
        combatant: Combatant,
        turn_index: usize,
    },
    CombatantRemoved {
        combatant_id: CombatantId,
        turn_index: usize,
    },
    InitiativeChanged {
        assignments: Vec<InitiativeAssignment>,
        /// The resulting initiative order, highest first
        order: Vec<CombatantId>,
        turn_index: usize,
    },
    TurnChanged {
        round: u32,
        turn_index: usize,
        active_id: CombatantId,
        /// Round-based conditions on the entering combatant that just expired
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        expired_conditions: Vec<String>,
    },
    ActionSpent {
        combatant_id: CombatantId,
        slot: ActionSlot,
    },
    MovementUsed {
        combatant_id: CombatantId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<GridCell>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<GridCell>,
        /// Movement remaining after the spend
        movement: u32,
    },
    MovementUndone {
        combatant_id: CombatantId,
        /// Position before the undo (where the combatant had moved to)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<GridCell>,
        /// Restored position
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<GridCell>,
        /// Movement remaining after the restore
        movement: u32,
    },
    EconomyReset {
        combatant_id: CombatantId,
    },
    ConditionAdded {
        combatant_id: CombatantId,
        condition: Condition,
    },
    ConditionRemoved {
        combatant_id: CombatantId,
        name: String,
    },
    NpcHitPointsChanged {
        combatant_id: CombatantId,
        hit_points: i32,
    },
    CellsRevealed {
        cells: Vec<GridCell>,
        /// Combatants standing in the newly revealed cells, so restricted
        /// viewers learn about them the moment the fog lifts
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        combatants: Vec<Combatant>,
    },
    CellsHidden {
        cells: Vec<GridCell>,
    },
    /// Produced only by the visibility filter when a combatant crosses into a
    /// viewer's revealed area; the state machine never emits this.
    CombatantAppeared {
        combatant: Combatant,
    },
    /// Counterpart of [`StateDelta::CombatantAppeared`] for a combatant that
    /// left the viewer's revealed area.
    CombatantConcealed {
        combatant_id: CombatantId,
    },
}
