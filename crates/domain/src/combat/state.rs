//! The authoritative combat state machine
//!
//! One instance per room. Two states: idle and active. While idle the round
//! counter and turn pointer are ignored; combatants may still be added or
//! removed so a roster can be staged before initiative is rolled.
//!
//! Every transition validates its preconditions before touching anything, so
//! a rejection never leaves partial mutation behind. Successful transitions
//! return a [`StateDelta`] describing exactly what changed.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CombatError;
use crate::ids::{CharacterId, CombatantId};
use crate::map::GridCell;

use super::combatant::{ActionSlot, Combatant, CombatantKind, MoveUndo};
use super::condition::Condition;
use super::delta::{InitiativeAssignment, StateDelta};

/// Initiative tracker for one room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatState {
    active: bool,
    round: u32,
    turn_index: usize,
    combatants: Vec<Combatant>,
}

impl Default for CombatState {
    fn default() -> Self {
        Self::new()
    }
}

impl CombatState {
    pub fn new() -> Self {
        Self {
            active: false,
            round: 1,
            turn_index: 0,
            combatants: Vec::new(),
        }
    }

    // Read-only accessors

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    /// The combatant whose turn it currently is
    pub fn current(&self) -> Option<&Combatant> {
        if !self.active {
            return None;
        }
        self.combatants.get(self.turn_index)
    }

    pub fn find_by_character(&self, character_id: CharacterId) -> Option<&Combatant> {
        self.combatants
            .iter()
            .find(|c| c.character_id() == Some(character_id))
    }

    /// Ids of combatants that have no initiative value yet
    pub fn unset_initiative_ids(&self) -> Vec<CombatantId> {
        self.combatants
            .iter()
            .filter(|c| c.initiative.is_none())
            .map(|c| c.id)
            .collect()
    }

    /// Combatants positioned in any of the given cells
    pub fn combatants_in_cells(&self, cells: &[GridCell]) -> Vec<Combatant> {
        self.combatants
            .iter()
            .filter(|c| c.position.is_some_and(|p| cells.contains(&p)))
            .cloned()
            .collect()
    }

    // Transitions

    /// Begin combat with the staged roster plus the given additions.
    ///
    /// The provided combatants join whatever was already staged while idle
    /// (typically NPCs added ahead of the fight). All resource pools reset to
    /// full and the order is sorted by initiative.
    pub fn start_combat(&mut self, roster: Vec<Combatant>) -> Result<StateDelta, CombatError> {
        if self.active {
            return Err(CombatError::invalid("combat is already running"));
        }

        let mut seen: HashSet<CharacterId> = self
            .combatants
            .iter()
            .filter_map(|c| c.character_id())
            .collect();
        for combatant in &roster {
            if let Some(character_id) = combatant.character_id() {
                if !seen.insert(character_id) {
                    return Err(CombatError::DuplicateCombatant(character_id.to_string()));
                }
            }
        }

        self.combatants.extend(roster);
        for combatant in &mut self.combatants {
            combatant.resources.reset();
            combatant.pending_undo = None;
        }
        Self::sort_by_initiative(&mut self.combatants);

        self.active = true;
        self.round = 1;
        self.turn_index = 0;

        Ok(StateDelta::CombatStarted {
            round: self.round,
            turn_index: self.turn_index,
            combatants: self.combatants.clone(),
        })
    }

    /// End combat and discard all per-combatant state
    pub fn end_combat(&mut self) -> Result<StateDelta, CombatError> {
        if !self.active {
            return Err(CombatError::invalid("no combat is running"));
        }
        self.active = false;
        self.round = 1;
        self.turn_index = 0;
        self.combatants.clear();
        Ok(StateDelta::CombatEnded)
    }

    /// Add a combatant in either state, respecting sort order when an
    /// initiative value is supplied
    pub fn add_combatant(&mut self, combatant: Combatant) -> Result<StateDelta, CombatError> {
        if self.combatants.iter().any(|c| c.id == combatant.id) {
            return Err(CombatError::DuplicateCombatant(combatant.id.to_string()));
        }
        if let Some(character_id) = combatant.character_id() {
            if self.find_by_character(character_id).is_some() {
                return Err(CombatError::DuplicateCombatant(character_id.to_string()));
            }
        }

        let holder = self.current_holder_id();
        let insert_at = match combatant.initiative {
            Some(value) => self
                .combatants
                .iter()
                .position(|c| c.initiative.map_or(true, |existing| existing < value))
                .unwrap_or(self.combatants.len()),
            None => self.combatants.len(),
        };
        let snapshot = combatant.clone();
        self.combatants.insert(insert_at, combatant);
        self.follow_holder(holder, None);

        Ok(StateDelta::CombatantAdded {
            combatant: snapshot,
            turn_index: self.turn_index,
        })
    }

    /// Remove a combatant. If the current turn holder is removed, the turn
    /// pointer is clamped so the holder becomes whoever now occupies that
    /// index rather than skipping a turn.
    pub fn remove_combatant(&mut self, id: CombatantId) -> Result<StateDelta, CombatError> {
        let index = self
            .combatants
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| CombatError::not_found("Combatant", id))?;

        self.combatants.remove(index);
        if index < self.turn_index {
            self.turn_index -= 1;
        }
        self.turn_index = self
            .turn_index
            .min(self.combatants.len().saturating_sub(1));

        Ok(StateDelta::CombatantRemoved {
            combatant_id: id,
            turn_index: self.turn_index,
        })
    }

    /// Assign an initiative value and re-sort
    pub fn set_initiative(
        &mut self,
        id: CombatantId,
        value: i32,
    ) -> Result<StateDelta, CombatError> {
        self.assign_initiatives(&[(id, value)])
    }

    /// Assign several initiative values in one transition (used when rolling
    /// for every unset combatant at once). An empty assignment list is valid
    /// and changes nothing beyond reporting the current order.
    pub fn assign_initiatives(
        &mut self,
        assignments: &[(CombatantId, i32)],
    ) -> Result<StateDelta, CombatError> {
        for (id, _) in assignments {
            if self.combatant(*id).is_none() {
                return Err(CombatError::not_found("Combatant", *id));
            }
        }

        let holder = self.current_holder_id();
        let modified: HashSet<CombatantId> = assignments.iter().map(|(id, _)| *id).collect();
        for combatant in &mut self.combatants {
            if let Some((_, value)) = assignments.iter().find(|(id, _)| *id == combatant.id) {
                combatant.initiative = Some(*value);
            }
        }
        Self::sort_by_initiative(&mut self.combatants);
        self.follow_holder(holder, Some(&modified));

        Ok(StateDelta::InitiativeChanged {
            assignments: assignments
                .iter()
                .map(|(id, value)| InitiativeAssignment {
                    combatant_id: *id,
                    initiative: *value,
                })
                .collect(),
            order: self.combatants.iter().map(|c| c.id).collect(),
            turn_index: self.turn_index,
        })
    }

    /// Advance to the next combatant's turn.
    ///
    /// Wrapping past the end of the order increments the round. The entering
    /// combatant gets a full resource pool, its round-based conditions tick
    /// down (expired ones are removed), and its movement undo buffer clears.
    pub fn next_turn(&mut self) -> Result<StateDelta, CombatError> {
        self.require_active()?;
        if self.combatants.is_empty() {
            return Err(CombatError::invalid("no combatants in the encounter"));
        }

        let next = self.turn_index + 1;
        if next >= self.combatants.len() {
            self.round += 1;
            self.turn_index = 0;
        } else {
            self.turn_index = next;
        }

        let entering = &mut self.combatants[self.turn_index];
        entering.resources.reset();
        entering.pending_undo = None;
        let mut expired_conditions = Vec::new();
        entering.conditions.retain_mut(|condition| {
            if condition.tick() {
                expired_conditions.push(condition.name.clone());
                false
            } else {
                true
            }
        });

        Ok(StateDelta::TurnChanged {
            round: self.round,
            turn_index: self.turn_index,
            active_id: entering.id,
            expired_conditions,
        })
    }

    /// Step the turn pointer backwards.
    ///
    /// This is a navigation aid, not an undo: resource resets and condition
    /// ticks already applied by [`next_turn`](Self::next_turn) stay applied.
    pub fn previous_turn(&mut self) -> Result<StateDelta, CombatError> {
        self.require_active()?;
        if self.combatants.is_empty() {
            return Err(CombatError::invalid("no combatants in the encounter"));
        }

        if self.turn_index == 0 {
            self.turn_index = self.combatants.len() - 1;
            self.round = self.round.saturating_sub(1).max(1);
        } else {
            self.turn_index -= 1;
        }

        Ok(StateDelta::TurnChanged {
            round: self.round,
            turn_index: self.turn_index,
            active_id: self.combatants[self.turn_index].id,
            expired_conditions: Vec::new(),
        })
    }

    /// Spend a boolean resource. Rejected without mutation if already spent.
    pub fn spend(
        &mut self,
        id: CombatantId,
        slot: ActionSlot,
    ) -> Result<StateDelta, CombatError> {
        self.require_active()?;
        let combatant = self.combatant_mut(id)?;
        let flag = match slot {
            ActionSlot::Action => &mut combatant.resources.action,
            ActionSlot::BonusAction => &mut combatant.resources.bonus_action,
            ActionSlot::Reaction => &mut combatant.resources.reaction,
        };
        if !*flag {
            return Err(CombatError::invalid(match slot {
                ActionSlot::Action => "action already spent this turn",
                ActionSlot::BonusAction => "bonus action already spent this turn",
                ActionSlot::Reaction => "reaction already spent this round",
            }));
        }
        *flag = false;
        Ok(StateDelta::ActionSpent {
            combatant_id: id,
            slot,
        })
    }

    /// Spend movement, optionally relocating the combatant. The pre-move
    /// position and movement value land in the single-slot undo buffer.
    pub fn use_movement(
        &mut self,
        id: CombatantId,
        feet: u32,
        to: Option<GridCell>,
    ) -> Result<StateDelta, CombatError> {
        self.require_active()?;
        let combatant = self.combatant_mut(id)?;

        let from = combatant.position;
        combatant.pending_undo = Some(MoveUndo {
            position: from,
            movement: combatant.resources.movement,
        });
        combatant.resources.movement = combatant.resources.movement.saturating_sub(feet);
        if to.is_some() {
            combatant.position = to;
        }

        Ok(StateDelta::MovementUsed {
            combatant_id: id,
            from,
            to: combatant.position,
            movement: combatant.resources.movement,
        })
    }

    /// Restore the position and movement captured by the last
    /// [`use_movement`](Self::use_movement). Valid once per buffered move.
    pub fn undo_movement(&mut self, id: CombatantId) -> Result<StateDelta, CombatError> {
        self.require_active()?;
        let combatant = self.combatant_mut(id)?;
        let undo = combatant
            .pending_undo
            .take()
            .ok_or_else(|| CombatError::invalid("no movement to undo"))?;

        let from = combatant.position;
        combatant.position = undo.position;
        combatant.resources.movement = undo.movement.min(combatant.resources.max_movement);

        Ok(StateDelta::MovementUndone {
            combatant_id: id,
            from,
            position: combatant.position,
            movement: combatant.resources.movement,
        })
    }

    /// Restore a full resource pool unconditionally
    pub fn reset_action_economy(&mut self, id: CombatantId) -> Result<StateDelta, CombatError> {
        self.require_active()?;
        let combatant = self.combatant_mut(id)?;
        combatant.resources.reset();
        Ok(StateDelta::EconomyReset { combatant_id: id })
    }

    /// Add a condition, replacing any existing condition with the same name
    pub fn add_condition(
        &mut self,
        id: CombatantId,
        condition: Condition,
    ) -> Result<StateDelta, CombatError> {
        let combatant = self.combatant_mut(id)?;
        combatant.conditions.retain(|c| c.name != condition.name);
        combatant.conditions.push(condition.clone());
        Ok(StateDelta::ConditionAdded {
            combatant_id: id,
            condition,
        })
    }

    /// Remove a condition by name
    pub fn remove_condition(
        &mut self,
        id: CombatantId,
        name: &str,
    ) -> Result<StateDelta, CombatError> {
        let combatant = self.combatant_mut(id)?;
        let before = combatant.conditions.len();
        combatant.conditions.retain(|c| c.name != name);
        if combatant.conditions.len() == before {
            return Err(CombatError::not_found("Condition", name));
        }
        Ok(StateDelta::ConditionRemoved {
            combatant_id: id,
            name: name.to_string(),
        })
    }

    /// Damage or heal an NPC combatant's inline hit points, clamped to
    /// `[0, max]`. Player-controlled hit points live in the character store
    /// and are never mutated here.
    pub fn adjust_npc_hit_points(
        &mut self,
        id: CombatantId,
        change: i32,
    ) -> Result<StateDelta, CombatError> {
        let combatant = self.combatant_mut(id)?;
        let stats = match &mut combatant.kind {
            CombatantKind::Npc { stats } => stats,
            CombatantKind::PlayerCharacter { .. } => {
                return Err(CombatError::invalid(
                    "player character hit points are managed by the character store",
                ));
            }
        };
        stats.hit_points = (stats.hit_points + change).clamp(0, stats.max_hit_points);
        Ok(StateDelta::NpcHitPointsChanged {
            combatant_id: id,
            hit_points: stats.hit_points,
        })
    }

    // Internal helpers

    fn require_active(&self) -> Result<(), CombatError> {
        if self.active {
            Ok(())
        } else {
            Err(CombatError::invalid("no combat is running"))
        }
    }

    fn combatant_mut(&mut self, id: CombatantId) -> Result<&mut Combatant, CombatError> {
        self.combatants
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CombatError::not_found("Combatant", id))
    }

    fn current_holder_id(&self) -> Option<CombatantId> {
        if !self.active {
            return None;
        }
        self.combatants.get(self.turn_index).map(|c| c.id)
    }

    /// After a re-sort or insert, keep the turn pointer on the same combatant
    /// identity. When the holder itself was the combatant being modified the
    /// pointer stays at its numeric index instead.
    fn follow_holder(&mut self, holder: Option<CombatantId>, modified: Option<&HashSet<CombatantId>>) {
        let Some(holder_id) = holder else {
            self.turn_index = self
                .turn_index
                .min(self.combatants.len().saturating_sub(1));
            return;
        };
        let holder_was_modified = modified.is_some_and(|m| m.contains(&holder_id));
        if !holder_was_modified {
            if let Some(index) = self.combatants.iter().position(|c| c.id == holder_id) {
                self.turn_index = index;
                return;
            }
        }
        self.turn_index = self
            .turn_index
            .min(self.combatants.len().saturating_sub(1));
    }

    /// Stable sort: initiative descending, unset values last, ties keep
    /// their relative insertion order.
    fn sort_by_initiative(combatants: &mut [Combatant]) {
        combatants.sort_by(|a, b| match (a.initiative, b.initiative) {
            (Some(lhs), Some(rhs)) => rhs.cmp(&lhs),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::condition::ConditionDuration;
    use crate::combat::StatBlock;
    use crate::ids::UserId;

    fn npc(name: &str) -> Combatant {
        Combatant::npc(name, StatBlock::commoner(), 30)
    }

    fn npc_with_initiative(name: &str, initiative: i32) -> Combatant {
        npc(name).with_initiative(initiative)
    }

    fn started(combatants: Vec<Combatant>) -> CombatState {
        let mut state = CombatState::new();
        state.start_combat(combatants).expect("start combat");
        state
    }

    fn id_of(state: &CombatState, name: &str) -> CombatantId {
        state
            .combatants()
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
            .expect("combatant by name")
    }

    #[test]
    fn test_start_combat_rejected_when_active() {
        let mut state = started(vec![npc("Goblin")]);
        let err = state.start_combat(vec![npc("Orc")]);
        assert!(matches!(err, Err(CombatError::InvalidTransition(_))));
        // Rejection left the roster untouched
        assert_eq!(state.combatants().len(), 1);
    }

    #[test]
    fn test_start_combat_includes_staged_combatants() {
        let mut state = CombatState::new();
        state.add_combatant(npc("Staged Ogre")).expect("stage npc");
        state.start_combat(vec![npc("Fighter")]).expect("start");

        assert!(state.active());
        assert_eq!(state.round(), 1);
        assert_eq!(state.turn_index(), 0);
        assert_eq!(state.combatants().len(), 2);
    }

    #[test]
    fn test_start_combat_rejects_duplicate_character() {
        let user = UserId::new();
        let character = CharacterId::new();
        let mut state = CombatState::new();
        state
            .add_combatant(Combatant::player("Aragorn", character, user, 30))
            .expect("stage pc");

        let err = state.start_combat(vec![Combatant::player("Aragorn again", character, user, 30)]);
        assert!(matches!(err, Err(CombatError::DuplicateCombatant(_))));
        assert!(!state.active());
    }

    #[test]
    fn test_initiative_order_descending_ties_by_insertion() {
        // A(15), B(15), C(20) added in that order sorts to [C, A, B]
        let state = started(vec![
            npc_with_initiative("A", 15),
            npc_with_initiative("B", 15),
            npc_with_initiative("C", 20),
        ]);
        let names: Vec<&str> = state.combatants().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_roll_all_noop_when_all_set_preserves_order() {
        let mut state = started(vec![
            npc_with_initiative("A", 15),
            npc_with_initiative("B", 15),
            npc_with_initiative("C", 20),
        ]);
        assert!(state.unset_initiative_ids().is_empty());

        let delta = state.assign_initiatives(&[]).expect("empty assignment");
        let names: Vec<&str> = state.combatants().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
        match delta {
            StateDelta::InitiativeChanged { assignments, .. } => assert!(assignments.is_empty()),
            other => panic!("unexpected delta: {other:?}"),
        }
    }

    #[test]
    fn test_unset_initiative_sorts_last() {
        let state = started(vec![
            npc("No Roll"),
            npc_with_initiative("Rolled", 5),
        ]);
        let names: Vec<&str> = state.combatants().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Rolled", "No Roll"]);
    }

    #[test]
    fn test_round_increments_once_per_full_cycle() {
        let mut state = started(vec![npc("A"), npc("B")]);

        state.next_turn().expect("turn 1");
        assert_eq!(state.round(), 1);
        assert_eq!(state.turn_index(), 1);

        state.next_turn().expect("turn 2 wraps");
        assert_eq!(state.round(), 2);
        assert_eq!(state.turn_index(), 0);
    }

    #[test]
    fn test_turn_index_stays_in_bounds_over_many_turns() {
        let mut state = started(vec![npc("A"), npc("B"), npc("C")]);
        for _ in 0..20 {
            state.next_turn().expect("advance");
            assert!(state.turn_index() < state.combatants().len());
        }
        // 20 advances over 3 combatants: rounds 1 + 20/3 complete wraps
        assert_eq!(state.round(), 7);
    }

    #[test]
    fn test_next_turn_resets_entering_resource_pool() {
        let mut state = started(vec![npc("A"), npc("B")]);
        let a = id_of(&state, "A");
        let b = id_of(&state, "B");

        state.spend(a, ActionSlot::Action).expect("spend A action");
        state.next_turn().expect("to B");
        state.spend(b, ActionSlot::Action).expect("spend B action");
        state.next_turn().expect("wrap to A");

        // A re-enters with a full pool; B keeps its spent action until its turn
        let a_resources = state.combatant(a).expect("A").resources;
        assert!(a_resources.action);
        let b_resources = state.combatant(b).expect("B").resources;
        assert!(!b_resources.action);

        state.next_turn().expect("to B again");
        assert!(state.combatant(b).expect("B").resources.action);
    }

    #[test]
    fn test_next_turn_ticks_round_conditions_on_entering_combatant() {
        let mut state = started(vec![npc("A"), npc("B")]);
        let b = id_of(&state, "B");
        state
            .add_condition(
                b,
                Condition::new("Stunned", ConditionDuration::Rounds { remaining: 1 }),
            )
            .expect("add condition");

        let delta = state.next_turn().expect("to B");
        match delta {
            StateDelta::TurnChanged {
                expired_conditions, ..
            } => assert_eq!(expired_conditions, vec!["Stunned".to_string()]),
            other => panic!("unexpected delta: {other:?}"),
        }
        assert!(state.combatant(b).expect("B").conditions.is_empty());
    }

    #[test]
    fn test_indefinite_condition_survives_turns() {
        let mut state = started(vec![npc("A"), npc("B")]);
        let b = id_of(&state, "B");
        state
            .add_condition(b, Condition::new("Blinded", ConditionDuration::Indefinite))
            .expect("add condition");

        state.next_turn().expect("to B");
        state.next_turn().expect("wrap to A");
        assert!(state.combatant(b).expect("B").condition("Blinded").is_some());
    }

    #[test]
    fn test_condition_replaces_same_name() {
        let mut state = started(vec![npc("A")]);
        let a = id_of(&state, "A");
        state
            .add_condition(a, Condition::new("Poisoned", ConditionDuration::Indefinite))
            .expect("first");
        state
            .add_condition(
                a,
                Condition::new("Poisoned", ConditionDuration::Rounds { remaining: 3 }),
            )
            .expect("replacement");

        let combatant = state.combatant(a).expect("A");
        assert_eq!(combatant.conditions.len(), 1);
        assert_eq!(
            combatant.condition("Poisoned").map(|c| c.duration),
            Some(ConditionDuration::Rounds { remaining: 3 })
        );
    }

    #[test]
    fn test_remove_missing_condition_is_not_found() {
        let mut state = started(vec![npc("A")]);
        let a = id_of(&state, "A");
        let err = state.remove_condition(a, "Prone");
        assert!(matches!(err, Err(CombatError::NotFound { .. })));
    }

    #[test]
    fn test_previous_turn_does_not_reverse_side_effects() {
        let mut state = started(vec![npc("A"), npc("B")]);
        let b = id_of(&state, "B");
        state
            .add_condition(
                b,
                Condition::new("Burning", ConditionDuration::Rounds { remaining: 2 }),
            )
            .expect("add condition");

        state.next_turn().expect("to B, ticks Burning to 1");
        state.previous_turn().expect("back to A");

        // The tick already applied stays applied
        assert_eq!(
            state.combatant(b).expect("B").condition("Burning").map(|c| c.duration),
            Some(ConditionDuration::Rounds { remaining: 1 })
        );
        assert_eq!(state.turn_index(), 0);
    }

    #[test]
    fn test_previous_turn_wraps_and_floors_round_at_one() {
        let mut state = started(vec![npc("A"), npc("B")]);
        state.previous_turn().expect("wrap backwards");
        assert_eq!(state.turn_index(), 1);
        assert_eq!(state.round(), 1);
    }

    #[test]
    fn test_spend_rejects_double_use() {
        let mut state = started(vec![npc("A")]);
        let a = id_of(&state, "A");
        state.spend(a, ActionSlot::BonusAction).expect("first spend");
        let err = state.spend(a, ActionSlot::BonusAction);
        assert!(matches!(err, Err(CombatError::InvalidTransition(_))));
        // Still spent, not toggled back
        assert!(!state.combatant(a).expect("A").resources.bonus_action);
    }

    #[test]
    fn test_movement_spend_and_undo_restores_exactly() {
        let mut state = started(vec![npc("A")]);
        let a = id_of(&state, "A");
        state
            .use_movement(a, 15, Some(GridCell::new(4, 4)))
            .expect("move");
        assert_eq!(state.combatant(a).expect("A").resources.movement, 15);

        state.undo_movement(a).expect("undo");
        let combatant = state.combatant(a).expect("A");
        assert_eq!(combatant.resources.movement, 30);
        assert_eq!(combatant.position, None);
    }

    #[test]
    fn test_undo_twice_is_rejected_without_change() {
        let mut state = started(vec![npc("A")]);
        let a = id_of(&state, "A");
        state
            .use_movement(a, 10, Some(GridCell::new(1, 1)))
            .expect("move");
        state.undo_movement(a).expect("first undo");

        let err = state.undo_movement(a);
        assert!(matches!(err, Err(CombatError::InvalidTransition(_))));
        assert_eq!(state.combatant(a).expect("A").resources.movement, 30);
    }

    #[test]
    fn test_movement_floors_at_zero() {
        let mut state = started(vec![npc("A")]);
        let a = id_of(&state, "A");
        state.use_movement(a, 500, None).expect("overspend");
        assert_eq!(state.combatant(a).expect("A").resources.movement, 0);
    }

    #[test]
    fn test_next_turn_clears_entering_undo_buffer() {
        let mut state = started(vec![npc("A"), npc("B")]);
        let a = id_of(&state, "A");
        state
            .use_movement(a, 5, Some(GridCell::new(2, 2)))
            .expect("move");

        state.next_turn().expect("to B");
        state.next_turn().expect("wrap to A, clears undo");

        let err = state.undo_movement(a);
        assert!(matches!(err, Err(CombatError::InvalidTransition(_))));
    }

    #[test]
    fn test_remove_current_holder_clamps_turn_index() {
        let mut state = started(vec![
            npc_with_initiative("A", 20),
            npc_with_initiative("B", 15),
            npc_with_initiative("C", 10),
        ]);
        state.next_turn().expect("to B");
        state.next_turn().expect("to C");

        // C holds the turn at index 2; removing it clamps to index 1 (B)
        let c = id_of(&state, "C");
        state.remove_combatant(c).expect("remove holder");
        assert_eq!(state.turn_index(), 1);
        assert!(state.turn_index() < state.combatants().len());
    }

    #[test]
    fn test_remove_before_holder_keeps_holder_identity() {
        let mut state = started(vec![
            npc_with_initiative("A", 20),
            npc_with_initiative("B", 15),
            npc_with_initiative("C", 10),
        ]);
        state.next_turn().expect("to B");

        let a = id_of(&state, "A");
        let b = id_of(&state, "B");
        state.remove_combatant(a).expect("remove A");
        assert_eq!(state.current().map(|c| c.id), Some(b));
    }

    #[test]
    fn test_remove_unknown_combatant_is_not_found() {
        let mut state = started(vec![npc("A")]);
        let err = state.remove_combatant(CombatantId::new());
        assert!(matches!(err, Err(CombatError::NotFound { .. })));
    }

    #[test]
    fn test_set_initiative_resort_follows_holder() {
        let mut state = started(vec![
            npc_with_initiative("A", 20),
            npc_with_initiative("B", 15),
            npc_with_initiative("C", 10),
        ]);
        state.next_turn().expect("to B");
        let b = id_of(&state, "B");
        let c = id_of(&state, "C");

        // C jumps above everyone; B keeps the turn even though its index moved
        state.set_initiative(c, 30).expect("boost C");
        assert_eq!(state.current().map(|x| x.id), Some(b));
        let names: Vec<&str> = state.combatants().iter().map(|x| x.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_set_initiative_on_holder_keeps_numeric_index() {
        let mut state = started(vec![
            npc_with_initiative("A", 20),
            npc_with_initiative("B", 15),
        ]);
        let a = id_of(&state, "A");
        let b = id_of(&state, "B");

        // A holds index 0 and drops below B: the pointer stays at index 0,
        // so B becomes the holder
        state.set_initiative(a, 1).expect("drop A");
        assert_eq!(state.current().map(|x| x.id), Some(b));
    }

    #[test]
    fn test_add_with_initiative_inserts_in_order_without_stealing_turn() {
        let mut state = started(vec![
            npc_with_initiative("A", 20),
            npc_with_initiative("B", 10),
        ]);
        let a = id_of(&state, "A");

        state
            .add_combatant(npc_with_initiative("Interloper", 15))
            .expect("insert");
        let names: Vec<&str> = state.combatants().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "Interloper", "B"]);
        assert_eq!(state.current().map(|c| c.id), Some(a));
    }

    #[test]
    fn test_add_duplicate_character_rejected() {
        let user = UserId::new();
        let character = CharacterId::new();
        let mut state = started(vec![Combatant::player("Hero", character, user, 30)]);

        let err = state.add_combatant(Combatant::player("Hero copy", character, user, 30));
        assert!(matches!(err, Err(CombatError::DuplicateCombatant(_))));
        assert_eq!(state.combatants().len(), 1);
    }

    #[test]
    fn test_end_combat_discards_everything() {
        let mut state = started(vec![npc("A"), npc("B")]);
        state.next_turn().expect("advance");
        state.end_combat().expect("end");

        assert!(!state.active());
        assert!(state.combatants().is_empty());
        assert_eq!(state.round(), 1);
    }

    #[test]
    fn test_transitions_rejected_while_idle() {
        let mut state = CombatState::new();
        assert!(matches!(
            state.next_turn(),
            Err(CombatError::InvalidTransition(_))
        ));
        assert!(matches!(
            state.end_combat(),
            Err(CombatError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_next_turn_rejected_when_roster_emptied() {
        let mut state = started(vec![npc("A")]);
        let a = id_of(&state, "A");
        state.remove_combatant(a).expect("remove last");

        assert!(state.active());
        assert!(matches!(
            state.next_turn(),
            Err(CombatError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_npc_damage_and_heal_clamp() {
        let mut state = started(vec![npc("Goblin")]);
        let goblin = id_of(&state, "Goblin");

        state.adjust_npc_hit_points(goblin, -100).expect("damage");
        let hp = |state: &CombatState| match &state.combatant(goblin).expect("goblin").kind {
            CombatantKind::Npc { stats } => stats.hit_points,
            _ => panic!("not an npc"),
        };
        assert_eq!(hp(&state), 0);

        state.adjust_npc_hit_points(goblin, 100).expect("heal");
        assert_eq!(hp(&state), 4);
    }

    #[test]
    fn test_player_hit_points_not_adjustable() {
        let mut state = started(vec![Combatant::player(
            "Hero",
            CharacterId::new(),
            UserId::new(),
            30,
        )]);
        let hero = id_of(&state, "Hero");
        let err = state.adjust_npc_hit_points(hero, -5);
        assert!(matches!(err, Err(CombatError::InvalidTransition(_))));
    }
}
