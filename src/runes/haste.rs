/// Haste → rune regeneration speed.
///
/// Haste comes from gear rating (plus temporary rating procs keyed by ability
/// id) and from multiplicative percentage procs keyed by buff name. Every
/// change that moves the resulting speed is pushed into the tracker.
use super::RuneTracker;
use crate::parser::{EventKind, LogEvent};
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap};

/// Haste rating per 1% haste at level 85.
pub const HASTE_RATING_CONVERSION: f64 = 12_805.716;

/// Temporary haste rating procs, by ability id.
pub static HASTE_RATING_PROCS: Lazy<HashMap<u32, f64>> = Lazy::new(|| {
    HashMap::from([
        (91_355, 1_314.0), // Shrine-Cleansing Purifier
        (91_821, 1_926.0), // Crushing Weight
        (92_342, 2_178.0), // Crushing Weight (H)
    ])
});

/// Multiplicative haste buffs, by name.
pub static HASTE_PERCENT_PROCS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("Unholy Frenzy",    1.2),
        ("Runic Corruption", 2.0),
        ("Bloodlust",        1.3),
        ("Heroism",          1.3),
        ("Time Warp",        1.3),
        ("Primal Rage",      1.3),
        ("Unholy Presence",  1.15),
        ("Berserking",       1.2),
    ])
});

#[derive(Debug, Clone)]
pub struct RuneHasteFeed {
    base_rating:    f64,
    rating_procs:   BTreeSet<u32>,
    percent_procs:  BTreeSet<&'static str>,
    speed:          f64,
}

impl RuneHasteFeed {
    /// `starting_auras` are buff names up at the pull; unknown names are
    /// ignored.
    pub fn new<'a>(base_rating: f64, starting_auras: impl IntoIterator<Item = &'a str>) -> Self {
        let percent_procs = starting_auras
            .into_iter()
            .filter_map(|name| HASTE_PERCENT_PROCS.get_key_value(name).map(|(k, _)| *k))
            .collect();

        let mut feed = Self {
            base_rating,
            rating_procs: BTreeSet::new(),
            percent_procs,
            speed: 1.0,
        };
        feed.speed = feed.compute_speed();
        feed
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    fn compute_speed(&self) -> f64 {
        let rating = self.base_rating
            + self
                .rating_procs
                .iter()
                .filter_map(|id| HASTE_RATING_PROCS.get(id))
                .sum::<f64>();

        // BTreeSet iteration keeps the product order stable
        let percent: f64 = self
            .percent_procs
            .iter()
            .filter_map(|name| HASTE_PERCENT_PROCS.get(name))
            .product();

        1.0 / ((1.0 + rating / HASTE_RATING_CONVERSION) * percent)
    }

    /// Apply the starting speed to a fresh tracker.
    pub fn seed(&self, tracker: &mut RuneTracker) {
        tracing::debug!("Rune regen speed seeded at {:.4}", self.speed);
        tracker.update_regen_speed(0, self.speed);
    }

    /// Feed one event; re-times the tracker if the speed changed.
    pub fn observe(&mut self, event: &LogEvent, tracker: &mut RuneTracker) {
        let changed = match event.kind {
            EventKind::ApplyBuff => self.gain(event),
            EventKind::RemoveBuff => self.lose(event),
            _ => false,
        };
        if !changed {
            return;
        }

        let speed = self.compute_speed();
        if speed != self.speed {
            tracing::debug!(
                "Rune regen speed {:.4} -> {:.4} at {}ms ({})",
                self.speed, speed, event.timestamp, event.ability
            );
            self.speed = speed;
            tracker.update_regen_speed(event.timestamp, speed);
        }
    }

    fn gain(&mut self, event: &LogEvent) -> bool {
        let mut changed = false;
        if HASTE_RATING_PROCS.contains_key(&event.ability_id) {
            changed |= self.rating_procs.insert(event.ability_id);
        }
        if let Some((name, _)) = HASTE_PERCENT_PROCS.get_key_value(event.ability.as_str()) {
            changed |= self.percent_procs.insert(*name);
        }
        changed
    }

    fn lose(&mut self, event: &LogEvent) -> bool {
        let rating = self.rating_procs.remove(&event.ability_id);
        let percent = self.percent_procs.remove(event.ability.as_str());
        rating || percent
    }
}
