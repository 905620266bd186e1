//! Timed status conditions
//!
//! A combatant holds at most one condition per name. Round-based conditions
//! tick down at the start of the afflicted combatant's turn and disappear
//! when they reach zero; indefinite and concentration conditions are only
//! removed explicitly.

use serde::{Deserialize, Serialize};

/// How long a condition lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "duration_type", rename_all = "snake_case")]
pub enum ConditionDuration {
    /// Lasts until removed by the game master
    Indefinite,
    /// Expires after the given number of the afflicted combatant's turns
    Rounds { remaining: u32 },
    /// Lasts while the caster concentrates; removed explicitly
    Concentration,
}

/// A named status effect on a combatant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    #[serde(flatten)]
    pub duration: ConditionDuration,
    /// What applied this condition (a spell name, a trap, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Condition {
    pub fn new(name: impl Into<String>, duration: ConditionDuration) -> Self {
        Self {
            name: name.into(),
            duration,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Advance one round. Returns true when the condition has expired.
    pub fn tick(&mut self) -> bool {
        match &mut self.duration {
            ConditionDuration::Rounds { remaining } => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            ConditionDuration::Indefinite | ConditionDuration::Concentration => false,
        }
    }
}
