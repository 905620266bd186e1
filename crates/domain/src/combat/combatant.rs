//! Combatants and their per-turn resources

use serde::{Deserialize, Serialize};

use crate::ids::{CharacterId, CombatantId, UserId};
use crate::map::GridCell;

use super::condition::Condition;

/// Combat-relevant stats for an independent (NPC) combatant.
///
/// Player-controlled combatants do not carry these; their record of truth is
/// the external character store, read once when the combatant is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatBlock {
    pub hit_points: i32,
    pub max_hit_points: i32,
    pub armor_class: i32,
    pub attack_bonus: i32,
}

impl StatBlock {
    /// Fallback stats when the catalog has no entry for a creature name
    pub fn commoner() -> Self {
        Self {
            hit_points: 4,
            max_hit_points: 4,
            armor_class: 10,
            attack_bonus: 2,
        }
    }
}

/// Who controls a combatant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CombatantKind {
    /// Controlled by a player; stats live in the external character store
    PlayerCharacter {
        character_id: CharacterId,
        user_id: UserId,
    },
    /// Run by the game master; stats resolved inline at add time
    Npc { stats: StatBlock },
}

/// The per-turn action/bonus-action/reaction/movement budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEconomy {
    pub action: bool,
    pub bonus_action: bool,
    pub reaction: bool,
    pub movement: u32,
    pub max_movement: u32,
}

impl ActionEconomy {
    pub fn fresh(max_movement: u32) -> Self {
        Self {
            action: true,
            bonus_action: true,
            reaction: true,
            movement: max_movement,
            max_movement,
        }
    }

    /// Restore the full budget, keeping `max_movement`
    pub fn reset(&mut self) {
        *self = Self::fresh(self.max_movement);
    }
}

/// Which boolean resource a spend targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSlot {
    Action,
    BonusAction,
    Reaction,
}

/// Single-slot movement undo buffer.
///
/// Captures the state immediately before a move; cleared when the owning
/// combatant's next turn begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveUndo {
    pub position: Option<GridCell>,
    pub movement: u32,
}

/// An entry in the initiative order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    /// Unset until rolled or assigned; unset combatants sort last
    pub initiative: Option<i32>,
    #[serde(flatten)]
    pub kind: CombatantKind,
    pub resources: ActionEconomy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<GridCell>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_undo: Option<MoveUndo>,
}

impl Combatant {
    pub fn player(
        name: impl Into<String>,
        character_id: CharacterId,
        user_id: UserId,
        speed: u32,
    ) -> Self {
        Self {
            id: CombatantId::new(),
            name: name.into(),
            initiative: None,
            kind: CombatantKind::PlayerCharacter {
                character_id,
                user_id,
            },
            resources: ActionEconomy::fresh(speed),
            conditions: Vec::new(),
            position: None,
            pending_undo: None,
        }
    }

    pub fn npc(name: impl Into<String>, stats: StatBlock, speed: u32) -> Self {
        Self {
            id: CombatantId::new(),
            name: name.into(),
            initiative: None,
            kind: CombatantKind::Npc { stats },
            resources: ActionEconomy::fresh(speed),
            conditions: Vec::new(),
            position: None,
            pending_undo: None,
        }
    }

    pub fn with_initiative(mut self, value: i32) -> Self {
        self.initiative = Some(value);
        self
    }

    pub fn at(mut self, position: GridCell) -> Self {
        self.position = Some(position);
        self
    }

    /// The character record backing this combatant, if player-controlled
    pub fn character_id(&self) -> Option<CharacterId> {
        match &self.kind {
            CombatantKind::PlayerCharacter { character_id, .. } => Some(*character_id),
            CombatantKind::Npc { .. } => None,
        }
    }

    /// The controlling user, if player-controlled
    pub fn controller(&self) -> Option<UserId> {
        match &self.kind {
            CombatantKind::PlayerCharacter { user_id, .. } => Some(*user_id),
            CombatantKind::Npc { .. } => None,
        }
    }

    pub fn condition(&self, name: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.name == name)
    }
}
