/// Rune tracker: owns the six slots and replays casts against them.
///
/// Every event touching the analyzed player goes through `process`, which
/// repairs simulated state if the log shows a cast the simulator thought was
/// impossible, spends the cost, handles Blood Tap and Empower Rune Weapon,
/// and returns the before/after snapshots that rules read later.
use super::{
    RuneAnnotation, RuneCost, RuneCounts, RuneSlot, RuneSnapshot, RuneType, TrackerError,
    SLOT_COUNT,
};
use crate::parser::{EventKind, LogEvent};
use serde::{Deserialize, Serialize};

pub const BLOOD_TAP:           &str = "Blood Tap";
pub const EMPOWER_RUNE_WEAPON: &str = "Empower Rune Weapon";

/// Fixed slot layout: three same-type pairs.
pub const SLOT_LAYOUT: [RuneType; SLOT_COUNT] = [
    RuneType::Blood,
    RuneType::Blood,
    RuneType::Frost,
    RuneType::Frost,
    RuneType::Unholy,
    RuneType::Unholy,
];

// Death rune priority when a type has no plain rune left. Frost costs eat
// frost-born death runes before blood-born ones.
const BLOOD_DEATH_ORDER:  [usize; SLOT_COUNT] = [0, 1, 2, 3, 4, 5];
const FROST_DEATH_ORDER:  [usize; SLOT_COUNT] = [2, 3, 0, 1, 4, 5];
const UNHOLY_DEATH_ORDER: [usize; SLOT_COUNT] = [0, 1, 2, 3, 4, 5];

// ---------------------------------------------------------------------------
// Conversion rules
// ---------------------------------------------------------------------------

/// Which casts turn their spent runes into death runes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRules {
    #[serde(default)]
    pub convert_blood:        bool,
    #[serde(default)]
    pub convert_frost:        bool,
    #[serde(default = "default_blood_converting")]
    pub blood_converting:     Vec<String>,
    #[serde(default = "default_frost_converting")]
    pub frost_converting:     Vec<String>,
    /// A rune type whose pair starts the fight as death runes.
    #[serde(default)]
    pub starting_death_runes: Option<RuneType>,
}

fn default_blood_converting() -> Vec<String> {
    vec!["Festering Strike".into(), "Pestilence".into(), "Blood Strike".into()]
}

fn default_frost_converting() -> Vec<String> {
    vec!["Festering Strike".into()]
}

impl Default for ConversionRules {
    fn default() -> Self {
        Self {
            convert_blood:        false,
            convert_frost:        false,
            blood_converting:     default_blood_converting(),
            frost_converting:     default_frost_converting(),
            starting_death_runes: None,
        }
    }
}

impl ConversionRules {
    fn converts(&self, kind: RuneType, ability: &str) -> bool {
        match kind {
            RuneType::Blood  => self.convert_blood && self.blood_converting.iter().any(|a| a == ability),
            RuneType::Frost  => self.convert_frost && self.frost_converting.iter().any(|a| a == ability),
            RuneType::Unholy => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RuneTracker {
    runes: [RuneSlot; SLOT_COUNT],
    rules: ConversionRules,
}

impl RuneTracker {
    pub fn new(rules: ConversionRules) -> Result<Self, TrackerError> {
        Self::with_layout(&SLOT_LAYOUT, rules)
    }

    /// Build a tracker from an explicit layout. Anything other than
    /// Blood/Blood/Frost/Frost/Unholy/Unholy is rejected.
    pub fn with_layout(layout: &[RuneType], rules: ConversionRules) -> Result<Self, TrackerError> {
        if layout.len() != SLOT_COUNT {
            return Err(TrackerError::InvalidLayout(format!(
                "expected {} slots, got {}",
                SLOT_COUNT,
                layout.len()
            )));
        }
        for kind in RuneType::ALL {
            let [a, b] = kind.slots();
            if layout[a] != kind || layout[b] != kind {
                return Err(TrackerError::InvalidLayout(format!(
                    "slots {}/{} must both be {}, got {:?}/{:?}",
                    a, b, kind.name(), layout[a], layout[b]
                )));
            }
        }

        let mut runes: [RuneSlot; SLOT_COUNT] =
            std::array::from_fn(|i| RuneSlot::new(layout[i], i));

        if let Some(kind) = rules.starting_death_runes {
            for i in kind.slots() {
                runes[i].convert_to_death()?;
            }
        }

        Ok(Self { runes, rules })
    }

    pub fn runes(&self) -> &[RuneSlot; SLOT_COUNT] {
        &self.runes
    }

    pub fn rules(&self) -> &ConversionRules {
        &self.rules
    }

    /// Both halves of the pair containing `index`, requested slot first.
    fn pair_mut(&mut self, index: usize) -> (&mut RuneSlot, &mut RuneSlot) {
        let base = index & !1;
        let (left, right) = self.runes[base..base + 2].split_at_mut(1);
        if index == base {
            (&mut left[0], &mut right[0])
        } else {
            (&mut right[0], &mut left[0])
        }
    }

    fn refresh_slot(&mut self, index: usize, t: f64) {
        let (slot, sibling) = self.pair_mut(index);
        slot.refresh(t, sibling);
    }

    fn spend_slot(&mut self, index: usize, t: f64, convert: bool) -> bool {
        let (slot, sibling) = self.pair_mut(index);
        slot.spend(t, sibling, convert)
    }

    fn spend_death_slot(&mut self, index: usize, t: f64, convert_back: bool) -> bool {
        let (slot, sibling) = self.pair_mut(index);
        slot.spend_death(t, sibling, convert_back)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn current_runes(&self, timestamp_ms: u64) -> RuneCounts {
        let t = timestamp_ms as f64;
        let plain = |kind: RuneType| {
            kind.slots()
                .into_iter()
                .filter(|&i| self.runes[i].can_spend(t) && !self.runes[i].is_death_like())
                .count() as u32
        };
        RuneCounts {
            blood:  plain(RuneType::Blood),
            frost:  plain(RuneType::Frost),
            unholy: plain(RuneType::Unholy),
            death:  self.runes.iter().filter(|r| r.can_spend_death(t)).count() as u32,
        }
    }

    pub fn snapshot(&self, timestamp_ms: u64) -> Vec<RuneSnapshot> {
        let t = timestamp_ms as f64;
        self.runes
            .iter()
            .map(|r| RuneSnapshot {
                name:         r.display(),
                is_available: r.can_spend(t),
                regen_time:   r.ready_at(),
            })
            .collect()
    }

    /// Oldest recharging slot matching `pred`; ties go to the lower index.
    fn oldest_recharging(&self, t: f64, pred: impl Fn(&RuneSlot) -> bool) -> Option<usize> {
        self.runes
            .iter()
            .filter(|r| !r.can_spend(t) && pred(r))
            .min_by(|a, b| a.ready_at().total_cmp(&b.ready_at()).then(a.index().cmp(&b.index())))
            .map(RuneSlot::index)
    }

    // -----------------------------------------------------------------------
    // Spending
    // -----------------------------------------------------------------------

    /// Pay `cost` for `ability`. Returns Ok(false) if any unit could not be
    /// paid; units already spent stay spent.
    pub fn spend(&mut self, ability: &str, timestamp_ms: u64, cost: &RuneCost) -> Result<bool, TrackerError> {
        let t = timestamp_ms as f64;
        let convert_blood = self.rules.converts(RuneType::Blood, ability);
        let convert_frost = self.rules.converts(RuneType::Frost, ability);

        let blood  = self.spend_runes(cost.blood,  RuneType::Blood,  &BLOOD_DEATH_ORDER,  t, convert_blood)?;
        let frost  = self.spend_runes(cost.frost,  RuneType::Frost,  &FROST_DEATH_ORDER,  t, convert_frost)?;
        let unholy = self.spend_runes(cost.unholy, RuneType::Unholy, &UNHOLY_DEATH_ORDER, t, false)?;

        Ok(blood && frost && unholy)
    }

    fn spend_runes(
        &mut self,
        num:         u32,
        kind:        RuneType,
        death_order: &[usize],
        t:           f64,
        convert:     bool,
    ) -> Result<bool, TrackerError> {
        if num == 0 {
            return Ok(true);
        }

        let mut spent = 0;

        // Plain runes first so death runes stay available for anything
        for i in kind.slots() {
            if spent == num {
                break;
            }
            if self.runes[i].can_spend(t) && !self.runes[i].is_death_like() && self.spend_slot(i, t, convert) {
                spent += 1;
            }
        }

        for &i in death_order {
            if spent == num {
                break;
            }
            if !self.runes[i].can_spend_death(t) || !self.spend_death_slot(i, t, !convert) {
                continue;
            }
            spent += 1;

            // A converting cast paid with a blood-tapped rune converts another
            // rune of the cost's type instead.
            if convert && self.runes[i].is_blood_tapped() {
                let target = kind.slots().into_iter().find(|&j| !self.runes[j].is_death_like());
                if let Some(j) = target {
                    self.runes[j].convert_to_death()?;
                }
            }
        }

        Ok(spent == num)
    }

    // -----------------------------------------------------------------------
    // Ability effects
    // -----------------------------------------------------------------------

    pub fn blood_tap(&mut self, timestamp_ms: u64) -> Result<(), TrackerError> {
        let t = timestamp_ms as f64;
        let [a, b] = RuneType::Blood.slots();

        if let Some(i) = [a, b].into_iter().find(|&i| !self.runes[i].is_death()) {
            self.runes[i].blood_tap()?;
        }
        if let Some(i) = [a, b].into_iter().find(|&i| !self.runes[i].can_spend(t)) {
            self.refresh_slot(i, t);
        }
        Ok(())
    }

    pub fn stop_blood_tap(&mut self) {
        if let Some(i) = RuneType::Blood.slots().into_iter().find(|&i| self.runes[i].is_blood_tapped()) {
            self.runes[i].stop_blood_tap();
        }
    }

    /// Refresh every recharging rune.
    pub fn empower_rune_weapon(&mut self, timestamp_ms: u64) {
        let t = timestamp_ms as f64;
        for i in 0..SLOT_COUNT {
            if !self.runes[i].can_spend(t) {
                self.refresh_slot(i, t);
            }
        }
    }

    /// A prepull cast that cost one of each rune before the log started.
    pub fn prime_prepull_cast(&mut self, cast_at_ms: f64) {
        for kind in RuneType::ALL {
            let i = kind.slots()[0];
            let cooldown = self.runes[i].cooldown_ms();
            self.runes[i].set_ready_at(cast_at_ms + cooldown);
        }
    }

    // -----------------------------------------------------------------------
    // Resynchronization
    // -----------------------------------------------------------------------

    /// Make `cost` payable at `timestamp_ms` if the log says it was paid.
    ///
    /// Ready death runes form one pool shared by all types. Each unit still
    /// missing refreshes the oldest recharging rune of its type, or failing
    /// that the oldest recharging death rune. Returns true if any slot moved.
    pub fn resynchronize(&mut self, timestamp_ms: u64, cost: &RuneCost) -> bool {
        let t = timestamp_ms as f64;
        let counts = self.current_runes(timestamp_ms);
        let mut death_left = counts.death;
        let mut changed = false;

        for kind in RuneType::ALL {
            let mut missing = cost.get(kind).saturating_sub(counts.get(kind));
            let covered = missing.min(death_left);
            missing -= covered;
            death_left -= covered;

            for _ in 0..missing {
                let target = self
                    .oldest_recharging(t, |r| r.kind() == kind)
                    .or_else(|| self.oldest_recharging(t, RuneSlot::is_death_like));
                let Some(i) = target else { break };
                self.refresh_slot(i, t);
                changed = true;
            }
        }

        if changed {
            tracing::debug!("Runes resynchronized at {}ms for cost {:?}", timestamp_ms, cost);
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Haste
    // -----------------------------------------------------------------------

    /// Re-time all pairs for a new regen speed.
    ///
    /// The later slot of a queued pair carries the earlier slot's cooldown as
    /// an absolute offset; it is taken out before rescaling and put back at
    /// the new cooldown.
    pub fn update_regen_speed(&mut self, timestamp_ms: u64, speed: f64) {
        let t = timestamp_ms as f64;
        for kind in RuneType::ALL {
            let [a, b] = kind.slots();
            let (first, second) = if self.runes[b].ready_at() < self.runes[a].ready_at() {
                (b, a)
            } else {
                (a, b)
            };

            let queued = self.runes[first].ready_at() > t
                && self.runes[second].ready_at() - self.runes[first].cooldown_ms() > t;

            if queued {
                let offset = self.runes[first].cooldown_ms();
                self.runes[second].shift_ready_at(-offset);
            }

            self.runes[first].set_regen_speed(t, speed);
            self.runes[second].set_regen_speed(t, speed);

            if queued {
                let offset = self.runes[first].cooldown_ms();
                self.runes[second].shift_ready_at(offset);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Event replay
    // -----------------------------------------------------------------------

    pub fn process(&mut self, event: &LogEvent) -> Result<RuneAnnotation, TrackerError> {
        let ts = event.timestamp;
        let cost = event.cost();

        let resynchronized = match &cost {
            Some(cost) => self.resynchronize(ts, cost),
            None => false,
        };

        let runes_before = self.snapshot(ts);
        let mut spend_failed = false;

        match event.kind {
            EventKind::Cast => {
                if let Some(cost) = &cost {
                    spend_failed = !self.spend(&event.ability, ts, cost)?;
                    if spend_failed {
                        tracing::debug!("Rune spend failed for {} at {}ms", event.ability, ts);
                    }
                }
                match event.ability.as_str() {
                    BLOOD_TAP           => self.blood_tap(ts)?,
                    EMPOWER_RUNE_WEAPON => self.empower_rune_weapon(ts),
                    _ => {}
                }
            }
            EventKind::RemoveBuff if event.ability == BLOOD_TAP => self.stop_blood_tap(),
            _ => {}
        }

        if cfg!(debug_assertions) {
            self.check_invariants()?;
        }

        Ok(RuneAnnotation {
            runes_before,
            runes_after: self.snapshot(ts),
            spend_failed,
            resynchronized,
        })
    }

    /// Pairing symmetry and death / blood tap exclusion.
    pub fn check_invariants(&self) -> Result<(), TrackerError> {
        for slot in &self.runes {
            let sibling = &self.runes[slot.pair_index()];
            if sibling.pair_index() != slot.index() || sibling.kind() != slot.kind() {
                return Err(TrackerError::BrokenPairing(slot.index()));
            }
            if slot.is_death() && slot.is_blood_tapped() {
                return Err(TrackerError::ConflictingConversion {
                    slot:      slot.index(),
                    attempted: "a death rune",
                    existing:  "blood tapped",
                });
            }
        }
        Ok(())
    }
}
