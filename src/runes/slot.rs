/// A single rune slot.
///
/// The slot never holds a reference to its sibling. Operations whose effect
/// depends on the sibling take it as an argument; the tracker hands out both
/// halves of a pair through `split_at_mut`.
use super::{RuneDisplay, RuneType, TrackerError, BASE_RUNE_CD_MS};

#[derive(Debug, Clone, PartialEq)]
pub struct RuneSlot {
    kind:         RuneType,
    index:        usize,
    ready_at:     f64,
    /// Converted by a rune-converting ability; reverts when spent as death.
    is_death:     bool,
    /// Converted by Blood Tap; stays death until the buff drops.
    blood_tapped: bool,
    regen_speed:  f64,
    cooldown_ms:  f64,
}

impl RuneSlot {
    pub fn new(kind: RuneType, index: usize) -> Self {
        Self {
            kind,
            index,
            ready_at:     0.0,
            is_death:     false,
            blood_tapped: false,
            regen_speed:  1.0,
            cooldown_ms:  BASE_RUNE_CD_MS,
        }
    }

    pub fn kind(&self)        -> RuneType { self.kind }
    pub fn index(&self)       -> usize    { self.index }
    pub fn ready_at(&self)    -> f64      { self.ready_at }
    pub fn is_death(&self)    -> bool     { self.is_death }
    pub fn is_blood_tapped(&self) -> bool { self.blood_tapped }
    pub fn regen_speed(&self) -> f64      { self.regen_speed }
    pub fn cooldown_ms(&self) -> f64      { self.cooldown_ms }

    /// Index of the sibling slot. Pairs are (0,1), (2,3), (4,5).
    pub fn pair_index(&self) -> usize {
        self.index ^ 1
    }

    /// Counts as a death rune for spending purposes.
    pub fn is_death_like(&self) -> bool {
        self.is_death || self.blood_tapped
    }

    pub fn can_spend(&self, timestamp: f64) -> bool {
        timestamp >= self.ready_at
    }

    pub fn can_spend_death(&self, timestamp: f64) -> bool {
        self.is_death_like() && self.can_spend(timestamp)
    }

    /// Force the slot ready at `timestamp`. A recharging sibling is pulled
    /// forward by the time this slot still had left.
    pub fn refresh(&mut self, timestamp: f64, sibling: &mut RuneSlot) {
        let deficit = (self.ready_at - timestamp).max(0.0);
        if !sibling.can_spend(timestamp) {
            sibling.ready_at -= deficit;
        }
        self.ready_at = timestamp;
    }

    /// Spend as the slot's own type. Returns false, untouched, if recharging.
    ///
    /// A recharging sibling delays this slot: its cooldown only starts once
    /// the sibling is back.
    pub fn spend(&mut self, timestamp: f64, sibling: &RuneSlot, convert: bool) -> bool {
        if !self.can_spend(timestamp) {
            return false;
        }

        self.ready_at = timestamp + self.cooldown_ms;
        if !sibling.can_spend(timestamp) {
            self.ready_at += sibling.ready_at - timestamp;
        }

        if convert && !self.blood_tapped {
            self.is_death = true;
        }
        true
    }

    /// Spend as a death rune. With `convert_back` a converted rune returns to
    /// its own type; blood-tapped runes keep their flag either way.
    pub fn spend_death(&mut self, timestamp: f64, sibling: &RuneSlot, convert_back: bool) -> bool {
        if !self.can_spend_death(timestamp) {
            return false;
        }
        if !self.spend(timestamp, sibling, false) {
            return false;
        }
        if convert_back && !self.blood_tapped {
            self.is_death = false;
        }
        true
    }

    pub fn convert_to_death(&mut self) -> Result<(), TrackerError> {
        if self.blood_tapped {
            return Err(TrackerError::ConflictingConversion {
                slot:      self.index,
                attempted: "converted to death",
                existing:  "blood tapped",
            });
        }
        self.is_death = true;
        Ok(())
    }

    pub fn blood_tap(&mut self) -> Result<(), TrackerError> {
        if self.is_death {
            return Err(TrackerError::ConflictingConversion {
                slot:      self.index,
                attempted: "blood tapped",
                existing:  "a death rune",
            });
        }
        self.blood_tapped = true;
        Ok(())
    }

    pub fn stop_blood_tap(&mut self) {
        self.blood_tapped = false;
    }

    /// Re-time the slot for a new regen speed. Only the remaining wait is
    /// rescaled; a ready slot just picks up the new cooldown.
    pub fn set_regen_speed(&mut self, timestamp: f64, speed: f64) {
        let previous = self.regen_speed;
        self.regen_speed = speed;
        self.cooldown_ms = BASE_RUNE_CD_MS * speed;

        if previous != speed && self.ready_at > timestamp {
            self.ready_at = timestamp + (self.ready_at - timestamp) * speed / previous;
        }
    }

    pub fn display(&self) -> RuneDisplay {
        if self.is_death_like() {
            RuneDisplay::Death
        } else {
            self.kind.into()
        }
    }

    pub(crate) fn set_ready_at(&mut self, ready_at: f64) {
        self.ready_at = ready_at;
    }

    pub(crate) fn shift_ready_at(&mut self, delta: f64) {
        self.ready_at += delta;
    }
}
