//! Dice rolling value objects
//!
//! Rolls arrive from clients as a structured `{num_dice, die_size, modifier}`
//! request rather than a formula string. The roll itself is injected as a
//! closure so this crate stays deterministic under test.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Die sizes a client may request
pub const VALID_DIE_SIZES: [u32; 7] = [4, 6, 8, 10, 12, 20, 100];

/// Maximum number of dice in a single roll request
pub const MAX_DICE_PER_ROLL: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RollError {
    #[error("Invalid die size: d{0}")]
    InvalidDieSize(u32),
    #[error("Dice count must be between 1 and {MAX_DICE_PER_ROLL}")]
    InvalidDiceCount,
}

/// A validated dice roll request like "3d6+2"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RollSpec {
    pub num_dice: u32,
    pub die_size: u32,
    pub modifier: i32,
}

impl RollSpec {
    pub fn new(num_dice: u32, die_size: u32, modifier: i32) -> Result<Self, RollError> {
        if !VALID_DIE_SIZES.contains(&die_size) {
            return Err(RollError::InvalidDieSize(die_size));
        }
        if num_dice == 0 || num_dice > MAX_DICE_PER_ROLL {
            return Err(RollError::InvalidDiceCount);
        }
        Ok(Self {
            num_dice,
            die_size,
            modifier,
        })
    }

    /// Validate an unchecked wire payload
    pub fn validate(&self) -> Result<Self, RollError> {
        Self::new(self.num_dice, self.die_size, self.modifier)
    }

    /// Execute the roll. `roll_die` must return a value in `1..=sides`.
    pub fn roll<F>(&self, mut roll_die: F) -> RollOutcome
    where
        F: FnMut(u32) -> u32,
    {
        let rolls: Vec<u32> = (0..self.num_dice).map(|_| roll_die(self.die_size)).collect();
        let total = rolls.iter().map(|r| *r as i64).sum::<i64>() + self.modifier as i64;
        RollOutcome {
            spec: *self,
            rolls,
            total,
        }
    }
}

/// The result of executing a [`RollSpec`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOutcome {
    pub spec: RollSpec,
    /// Individual die results, in roll order
    pub rolls: Vec<u32>,
    pub total: i64,
}
