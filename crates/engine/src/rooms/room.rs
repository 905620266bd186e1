//! A single room: combat state, map, and serialized transitions

use std::sync::Arc;

use tokio::sync::Mutex;

use battlegrid_domain::{
    ActionSlot, BattleMap, CharacterId, Combatant, CombatState, CombatantId, Condition, GridCell,
    RoomId, StateDelta, UserId,
};
use battlegrid_protocol::ParticipantRole;

use crate::error::EngineError;
use crate::ports::DiceRoller;

/// The identity on whose behalf a command runs
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: UserId,
    pub role: ParticipantRole,
    pub controlled_id: Option<CharacterId>,
}

impl Actor {
    pub fn is_game_master(&self) -> bool {
        self.role.is_game_master()
    }
}

/// A fully resolved room mutation.
///
/// Handlers resolve external lookups (character summaries, catalog defaults)
/// before constructing one of these, so applying a command never does I/O and
/// the per-room lock is held only for the synchronous transition.
#[derive(Debug, Clone)]
pub enum RoomCommand {
    StartCombat { roster: Vec<Combatant> },
    EndCombat,
    AddCombatant { combatant: Combatant },
    RemoveCombatant { combatant_id: CombatantId },
    SetInitiative { combatant_id: CombatantId, value: i32 },
    RollInitiative { combatant_id: CombatantId },
    RollAll,
    NextTurn,
    PreviousTurn,
    Spend { combatant_id: CombatantId, slot: ActionSlot },
    UseMovement { combatant_id: CombatantId, feet: u32, to: Option<GridCell> },
    UndoMovement { combatant_id: CombatantId },
    ResetActionEconomy { combatant_id: CombatantId },
    AddCondition { combatant_id: CombatantId, condition: Condition },
    RemoveCondition { combatant_id: CombatantId, name: String },
    AdjustHitPoints { combatant_id: CombatantId, change: i32 },
    RevealCells { cells: Vec<GridCell> },
    HideCells { cells: Vec<GridCell> },
}

/// Owned copy of a room's state, taken after a transition completes.
/// Broadcast and filtering read these, never the live state.
#[derive(Debug, Clone)]
pub struct RoomStateSnapshot {
    pub combat: CombatState,
    pub map: BattleMap,
}

struct RoomState {
    combat: CombatState,
    map: BattleMap,
}

/// One active room. All transitions are serialized behind the state mutex,
/// so two participants acting in the same instant observe a total order.
pub struct Room {
    id: RoomId,
    state: Mutex<RoomState>,
    dice: Arc<dyn DiceRoller>,
}

impl Room {
    pub fn new(id: RoomId, map_width: u32, map_height: u32, dice: Arc<dyn DiceRoller>) -> Self {
        Self {
            id,
            state: Mutex::new(RoomState {
                combat: CombatState::new(),
                map: BattleMap::new(map_width, map_height),
            }),
            dice,
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Consistent point-in-time copy for snapshot-on-connect
    pub async fn snapshot(&self) -> RoomStateSnapshot {
        let state = self.state.lock().await;
        RoomStateSnapshot {
            combat: state.combat.clone(),
            map: state.map.clone(),
        }
    }

    /// Authorize and apply one command atomically.
    ///
    /// On success returns the delta plus a snapshot taken under the same
    /// lock, so fan-out never observes a half-applied transition. On error
    /// nothing changed.
    pub async fn apply(
        &self,
        command: RoomCommand,
        actor: &Actor,
    ) -> Result<(StateDelta, RoomStateSnapshot), EngineError> {
        let mut state = self.state.lock().await;
        authorize(&state.combat, &command, actor)?;

        let delta = match command {
            RoomCommand::StartCombat { roster } => state.combat.start_combat(roster)?,
            RoomCommand::EndCombat => state.combat.end_combat()?,
            RoomCommand::AddCombatant { combatant } => state.combat.add_combatant(combatant)?,
            RoomCommand::RemoveCombatant { combatant_id } => {
                state.combat.remove_combatant(combatant_id)?
            }
            RoomCommand::SetInitiative {
                combatant_id,
                value,
            } => state.combat.set_initiative(combatant_id, value)?,
            RoomCommand::RollInitiative { combatant_id } => {
                let value = self.dice.roll(20) as i32;
                state.combat.set_initiative(combatant_id, value)?
            }
            RoomCommand::RollAll => {
                let assignments: Vec<(CombatantId, i32)> = state
                    .combat
                    .unset_initiative_ids()
                    .into_iter()
                    .map(|id| (id, self.dice.roll(20) as i32))
                    .collect();
                state.combat.assign_initiatives(&assignments)?
            }
            RoomCommand::NextTurn => state.combat.next_turn()?,
            RoomCommand::PreviousTurn => state.combat.previous_turn()?,
            RoomCommand::Spend { combatant_id, slot } => state.combat.spend(combatant_id, slot)?,
            RoomCommand::UseMovement {
                combatant_id,
                feet,
                to,
            } => state.combat.use_movement(combatant_id, feet, to)?,
            RoomCommand::UndoMovement { combatant_id } => {
                state.combat.undo_movement(combatant_id)?
            }
            RoomCommand::ResetActionEconomy { combatant_id } => {
                state.combat.reset_action_economy(combatant_id)?
            }
            RoomCommand::AddCondition {
                combatant_id,
                condition,
            } => state.combat.add_condition(combatant_id, condition)?,
            RoomCommand::RemoveCondition { combatant_id, name } => {
                state.combat.remove_condition(combatant_id, &name)?
            }
            RoomCommand::AdjustHitPoints {
                combatant_id,
                change,
            } => state.combat.adjust_npc_hit_points(combatant_id, change)?,
            RoomCommand::RevealCells { cells } => {
                let revealed = state.map.reveal(&cells);
                let combatants = state.combat.combatants_in_cells(&revealed);
                StateDelta::CellsRevealed {
                    cells: revealed,
                    combatants,
                }
            }
            RoomCommand::HideCells { cells } => StateDelta::CellsHidden {
                cells: state.map.hide(&cells),
            },
        };

        let snapshot = RoomStateSnapshot {
            combat: state.combat.clone(),
            map: state.map.clone(),
        };
        Ok((delta, snapshot))
    }
}

/// Permission rules, checked under the room lock so "is it their turn"
/// cannot race with a concurrent turn change.
///
/// The game master may do anything. A player may spend their own combatant's
/// action economy on its turn, use its reaction any time, and manage its
/// initiative value; everything room-wide is game-master only.
fn authorize(combat: &CombatState, command: &RoomCommand, actor: &Actor) -> Result<(), EngineError> {
    if actor.is_game_master() {
        return Ok(());
    }

    let controls = |combatant_id: CombatantId| -> bool {
        combat
            .combatant(combatant_id)
            .and_then(|c| c.character_id())
            .is_some_and(|character| Some(character) == actor.controlled_id)
    };
    let holds_turn = |combatant_id: CombatantId| -> bool {
        combat.current().map(|c| c.id) == Some(combatant_id)
    };

    match command {
        RoomCommand::Spend {
            combatant_id,
            slot: ActionSlot::Reaction,
        } => {
            if controls(*combatant_id) {
                Ok(())
            } else {
                Err(EngineError::unauthorized(
                    "you do not control this combatant",
                ))
            }
        }
        RoomCommand::Spend { combatant_id, .. }
        | RoomCommand::UseMovement { combatant_id, .. }
        | RoomCommand::UndoMovement { combatant_id } => {
            if !controls(*combatant_id) {
                Err(EngineError::unauthorized(
                    "you do not control this combatant",
                ))
            } else if !holds_turn(*combatant_id) {
                Err(EngineError::unauthorized("not this combatant's turn"))
            } else {
                Ok(())
            }
        }
        RoomCommand::SetInitiative { combatant_id, .. }
        | RoomCommand::RollInitiative { combatant_id } => {
            if controls(*combatant_id) {
                Ok(())
            } else {
                Err(EngineError::unauthorized(
                    "you do not control this combatant",
                ))
            }
        }
        _ => Err(EngineError::unauthorized(
            "this action requires the game master",
        )),
    }
}
