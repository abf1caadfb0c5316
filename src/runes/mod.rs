/// Rune regeneration simulator.
///
/// Six rune slots in three same-type pairs (Blood 0/1, Frost 2/3, Unholy 4/5).
/// Paired slots share one regeneration cycle: spending one while its sibling
/// is still recharging queues it behind the sibling, and forcing one ready
/// pulls the sibling forward by the same amount.
///
/// Timestamps on the event side are integer milliseconds relative to the
/// fight start; ready times are kept as `f64` so haste rescaling stays exact
/// enough to round-trip.
pub mod haste;
pub mod prepull;
pub mod slot;
pub mod tracker;

use serde::{Deserialize, Serialize};

pub use haste::RuneHasteFeed;
pub use slot::RuneSlot;
pub use tracker::{ConversionRules, RuneTracker};

/// Base rune cooldown at 0% haste.
pub const BASE_RUNE_CD_MS: f64 = 10_000.0;

pub const SLOT_COUNT: usize = 6;

// ---------------------------------------------------------------------------
// Rune types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuneType {
    Blood,
    Frost,
    Unholy,
}

impl RuneType {
    pub const ALL: [RuneType; 3] = [RuneType::Blood, RuneType::Frost, RuneType::Unholy];

    /// Slot indices of this type's pair.
    pub fn slots(self) -> [usize; 2] {
        match self {
            RuneType::Blood  => [0, 1],
            RuneType::Frost  => [2, 3],
            RuneType::Unholy => [4, 5],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RuneType::Blood  => "Blood",
            RuneType::Frost  => "Frost",
            RuneType::Unholy => "Unholy",
        }
    }
}

/// What a slot shows as on the timeline. Death covers both automatic
/// conversion and Blood Tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuneDisplay {
    Blood,
    Frost,
    Unholy,
    Death,
}

impl From<RuneType> for RuneDisplay {
    fn from(kind: RuneType) -> Self {
        match kind {
            RuneType::Blood  => RuneDisplay::Blood,
            RuneType::Frost  => RuneDisplay::Frost,
            RuneType::Unholy => RuneDisplay::Unholy,
        }
    }
}

// ---------------------------------------------------------------------------
// Costs and counts
// ---------------------------------------------------------------------------

/// Rune cost of an ability, as attached to cast events by the log normalizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuneCost {
    #[serde(rename = "Blood", default)]
    pub blood:  u32,
    #[serde(rename = "Frost", default)]
    pub frost:  u32,
    #[serde(rename = "Unholy", default)]
    pub unholy: u32,
}

impl RuneCost {
    pub fn new(blood: u32, frost: u32, unholy: u32) -> Self {
        Self { blood, frost, unholy }
    }

    pub fn get(&self, kind: RuneType) -> u32 {
        match kind {
            RuneType::Blood  => self.blood,
            RuneType::Frost  => self.frost,
            RuneType::Unholy => self.unholy,
        }
    }

    pub fn total(&self) -> u32 {
        self.blood + self.frost + self.unholy
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Spendable runes at a point in time. Death runes are counted only in
/// `death`, never under their underlying type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuneCounts {
    pub blood:  u32,
    pub frost:  u32,
    pub unholy: u32,
    pub death:  u32,
}

impl RuneCounts {
    pub fn get(&self, kind: RuneType) -> u32 {
        match kind {
            RuneType::Blood  => self.blood,
            RuneType::Frost  => self.frost,
            RuneType::Unholy => self.unholy,
        }
    }
}

// ---------------------------------------------------------------------------
// Event annotations
// ---------------------------------------------------------------------------

/// One slot as shown on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuneSnapshot {
    pub name:         RuneDisplay,
    pub is_available: bool,
    pub regen_time:   f64,
}

/// What the tracker stamps onto every processed event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuneAnnotation {
    pub runes_before:   Vec<RuneSnapshot>,
    pub runes_after:    Vec<RuneSnapshot>,
    /// The cost could not be paid from simulated state.
    #[serde(default)]
    pub spend_failed:   bool,
    /// The tracker force-refreshed slots to match what the log shows.
    #[serde(default)]
    pub resynchronized: bool,
}

impl RuneAnnotation {
    /// Ready runes of a display kind in the before snapshot.
    pub fn available_before(&self, name: RuneDisplay) -> usize {
        self.runes_before
            .iter()
            .filter(|r| r.name == name && r.is_available)
            .count()
    }

    /// Runes of a display kind that were ready before and recharging after.
    pub fn consumed(&self, name: RuneDisplay) -> usize {
        self.runes_before
            .iter()
            .zip(&self.runes_after)
            .filter(|(before, after)| before.name == name && before.is_available && !after.is_available)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Precondition violations inside the simulator. These come from the
/// tracker's own call sequencing, never from event data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackerError {
    #[error("invalid rune layout: {0}")]
    InvalidLayout(String),
    #[error("rune slot {slot} cannot be {attempted}: it is already {existing}")]
    ConflictingConversion {
        slot:      usize,
        attempted: &'static str,
        existing:  &'static str,
    },
    #[error("rune slot {0} pairing is not symmetric")]
    BrokenPairing(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(name: RuneDisplay, is_available: bool) -> RuneSnapshot {
        RuneSnapshot { name, is_available, regen_time: 0.0 }
    }

    #[test]
    fn cost_deserializes_with_missing_types() {
        let cost: RuneCost = serde_json::from_str(r#"{"Frost":1,"Unholy":1}"#).unwrap();
        assert_eq!(cost, RuneCost::new(0, 1, 1));
        assert_eq!(cost.total(), 2);
        assert!(!cost.is_empty());
    }

    #[test]
    fn annotation_counts_consumed_runes() {
        let ann = RuneAnnotation {
            runes_before: vec![snap(RuneDisplay::Death, true), snap(RuneDisplay::Frost, true)],
            runes_after:  vec![snap(RuneDisplay::Blood, false), snap(RuneDisplay::Frost, true)],
            ..Default::default()
        };
        assert_eq!(ann.available_before(RuneDisplay::Death), 1);
        assert_eq!(ann.consumed(RuneDisplay::Death), 1);
        assert_eq!(ann.consumed(RuneDisplay::Frost), 0);
    }
}
