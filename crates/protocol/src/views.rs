//! Per-viewer filtered view DTOs
//!
//! A `RoomView` is what a connecting client receives as its snapshot. The
//! engine's visibility filter builds one per distinct viewer key; the game
//! master's view is the identity transform, a player's view prunes hidden
//! combatants and fogs unrevealed cells.

use serde::{Deserialize, Serialize};

use battlegrid_domain::Combatant;

/// Full room state as one viewer is allowed to see it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomView {
    pub active: bool,
    pub round: u32,
    pub turn_index: usize,
    pub combatants: Vec<Combatant>,
    pub map: MapView,
}

/// The map as one viewer sees it: every in-bounds cell gets a status, so a
/// client can distinguish "hidden from you" from "revealed and empty"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapView {
    pub width: u32,
    pub height: u32,
    pub cells: Vec<CellView>,
}

impl MapView {
    pub fn status_at(&self, x: i32, y: i32) -> Option<CellStatus> {
        self.cells
            .iter()
            .find(|c| c.x == x && c.y == y)
            .map(|c| c.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellView {
    pub x: i32,
    pub y: i32,
    pub status: CellStatus,
}

/// Visibility status of a single map cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    /// Visible to players
    Revealed,
    /// Game-master view of a cell players cannot see
    Hidden,
    /// Player view of a cell they cannot see; contents are not reported
    Unknown,
}
