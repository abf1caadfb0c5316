/// Pre-pull Army of the Dead detection.
///
/// Army is usually cast before the pull, so the log never shows the cast or
/// its rune cost. The ghouls do show up, each with the time it despawns; the
/// last despawn tells when the channel started.
use super::RuneTracker;
use crate::parser::LogEvent;
use std::collections::HashMap;

/// Ghouls live 40 s after they become targetable, ~500 ms after summon.
pub const ARMY_DURATION_MS: u64 = 40_500;
pub const ARMY_CAST_TIME_MS: u64 = 4_000;
pub const ARMY_GHOULS: usize = 8;
pub const ARMY_SOURCE: &str = "Army of the Dead";

#[derive(Debug, Default)]
pub struct PrepullArmy {
    deaths:  HashMap<u32, u64>,
    cast_at: Option<f64>,
}

impl PrepullArmy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cast time once all ghouls were seen, relative to the fight start.
    pub fn cast_at(&self) -> Option<f64> {
        self.cast_at
    }

    /// Feed one event from the preprocessing pass. Returns the cast time the
    /// first time it becomes known.
    pub fn observe(&mut self, event: &LogEvent) -> Option<f64> {
        if self.cast_at.is_some() || event.timestamp > ARMY_DURATION_MS {
            return None;
        }

        if event.source.as_deref() == Some(ARMY_SOURCE) {
            if let (Some(instance), Some(dies_at)) = (event.source_instance, event.source_dies_at) {
                self.deaths.insert(instance, dies_at);
            }
        }

        if self.deaths.len() < ARMY_GHOULS {
            return None;
        }

        let last_death = self.deaths.values().copied().max()?;
        let cast_at = last_death as f64 - (ARMY_DURATION_MS + ARMY_CAST_TIME_MS) as f64;
        tracing::info!("Pre-pull Army of the Dead detected, cast at {}ms", cast_at);
        self.cast_at = Some(cast_at);
        Some(cast_at)
    }

    /// Charge the army's runes to `tracker` if a prepull cast was found.
    pub fn apply(&self, tracker: &mut RuneTracker) {
        if let Some(cast_at) = self.cast_at {
            tracker.prime_prepull_cast(cast_at);
        }
    }
}
