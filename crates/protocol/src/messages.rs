//! WebSocket message types for Engine-client communication
//!
//! These types are used by both the Engine (sending `ServerMessage`,
//! receiving `ClientMessage`) and any client implementation.
//!
//! Combat actions travel in a nested `{action, data}` envelope so the outer
//! message enum stays small while the transition vocabulary grows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use battlegrid_domain::{
    CharacterId, CombatantId, ConditionDuration, GridCell, RollOutcome, RollSpec, StateDelta,
    UserId,
};

use crate::types::{ErrorCode, ParticipantRole};
use crate::views::RoomView;

// =============================================================================
// Client Messages (client → Engine)
// =============================================================================

/// Messages from a client to the Engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A combat state transition request
    CombatAction { action: CombatAction },
    /// Roll dice, broadcast to the room (or whispered to the game master)
    DiceRoll {
        #[serde(flatten)]
        spec: RollSpec,
        #[serde(default)]
        character_name: Option<String>,
        /// Free-form label ("Stealth check", "Greataxe damage", ...)
        #[serde(default)]
        label: Option<String>,
        /// Deliver only to the game master and the roller
        #[serde(default)]
        whisper: bool,
    },
    /// Table chat
    Chat {
        message: String,
        /// Deliver only to the game master and the sender
        #[serde(default)]
        whisper: bool,
    },
    /// Heartbeat ping
    Heartbeat,
}

/// The combat transition envelope: `{"action": "...", "data": {...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum CombatAction {
    StartCombat {
        /// Player characters to pull into the encounter; already-staged
        /// combatants join automatically
        #[serde(default)]
        character_ids: Vec<CharacterId>,
    },
    EndCombat,
    AddCombatant {
        name: String,
        #[serde(default)]
        initiative: Option<i32>,
        /// Present for player-controlled combatants; stats come from the
        /// character store
        #[serde(default)]
        character_id: Option<CharacterId>,
        /// Catalog creature name for NPC stat defaults
        #[serde(default)]
        creature: Option<String>,
        #[serde(default)]
        position: Option<GridCell>,
    },
    RemoveCombatant {
        combatant_id: CombatantId,
    },
    SetInitiative {
        combatant_id: CombatantId,
        value: i32,
    },
    RollInitiative {
        combatant_id: CombatantId,
    },
    /// Roll a d20 for every combatant without an initiative value
    RollAll,
    NextTurn,
    PreviousTurn,
    UseAction {
        combatant_id: CombatantId,
    },
    UseBonusAction {
        combatant_id: CombatantId,
    },
    UseReaction {
        combatant_id: CombatantId,
    },
    UseMovement {
        combatant_id: CombatantId,
        feet: u32,
        #[serde(default)]
        to: Option<GridCell>,
    },
    UndoMovement {
        combatant_id: CombatantId,
    },
    ResetActionEconomy {
        combatant_id: CombatantId,
    },
    AddCondition {
        combatant_id: CombatantId,
        name: String,
        /// Omitted duration falls back to the condition catalog default
        #[serde(flatten)]
        duration: Option<ConditionDuration>,
        #[serde(default)]
        source: Option<String>,
    },
    RemoveCondition {
        combatant_id: CombatantId,
        name: String,
    },
    AdjustHitPoints {
        combatant_id: CombatantId,
        change: HpChangeKind,
        amount: u32,
    },
    RevealCells {
        cells: Vec<GridCell>,
    },
    HideCells {
        cells: Vec<GridCell>,
    },
}

/// Direction of an NPC hit point adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HpChangeKind {
    Damage,
    Healing,
}

// =============================================================================
// Server Messages (Engine → client)
// =============================================================================

/// Messages from the Engine to a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full current state, filtered for the receiving viewer. Sent on every
    /// (re)connect so clients never depend on delta continuity across a gap.
    RoomSnapshot { view: RoomView },
    /// An incremental state change, filtered for the receiving viewer
    CombatUpdate { delta: StateDelta },
    DiceResult {
        username: String,
        #[serde(default)]
        character_name: Option<String>,
        outcome: RollOutcome,
        #[serde(default)]
        label: Option<String>,
        whisper: bool,
        timestamp: DateTime<Utc>,
    },
    ChatMessage {
        username: String,
        message: String,
        whisper: bool,
        timestamp: DateTime<Utc>,
    },
    UserConnected {
        user_id: UserId,
        username: String,
        role: ParticipantRole,
    },
    UserDisconnected {
        user_id: UserId,
        username: String,
    },
    /// Reported only to the originating connection, never broadcast
    Error { code: ErrorCode, message: String },
    Pong,
}
