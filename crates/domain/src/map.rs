//! Battle map fog of war
//!
//! The map tracked here is deliberately thin: a grid extent plus the set of
//! cells the game master has revealed to players. Terrain, background images
//! and token rendering are client concerns; the engine only needs to know
//! which cells are visible so combatant filtering and cell reporting work.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A single grid coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

impl GridCell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Grid extent plus the revealed-cell set.
///
/// The reveal set is mutated only by explicit [`reveal`](Self::reveal) and
/// [`hide`](Self::hide) calls; it is never derived from other state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleMap {
    width: u32,
    height: u32,
    revealed: HashSet<GridCell>,
}

impl BattleMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            revealed: HashSet::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, cell: GridCell) -> bool {
        cell.x >= 0
            && cell.y >= 0
            && (cell.x as u32) < self.width
            && (cell.y as u32) < self.height
    }

    pub fn is_revealed(&self, cell: GridCell) -> bool {
        self.revealed.contains(&cell)
    }

    pub fn revealed_cells(&self) -> impl Iterator<Item = &GridCell> {
        self.revealed.iter()
    }

    /// Reveal cells, returning only the cells that were newly revealed.
    /// Out-of-bounds cells are ignored.
    pub fn reveal(&mut self, cells: &[GridCell]) -> Vec<GridCell> {
        cells
            .iter()
            .filter(|c| self.contains(**c) && self.revealed.insert(**c))
            .copied()
            .collect()
    }

    /// Hide cells, returning only the cells that were actually revealed before.
    pub fn hide(&mut self, cells: &[GridCell]) -> Vec<GridCell> {
        cells
            .iter()
            .filter(|c| self.revealed.remove(c))
            .copied()
            .collect()
    }
}
