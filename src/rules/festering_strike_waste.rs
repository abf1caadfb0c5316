/// Fires when Festering Strike is cast without both a Blood and a Frost rune
/// ready.
///
/// Festering Strike is what turns Blood and Frost runes into death runes for
/// Unholy. Casting it on death runes instead burns the runes it should have
/// produced. Casts under Bloodlust-type effects are not judged: runes come
/// back fast enough that waiting costs more than it saves.
use super::{advice, RotationRule, RuleContext, RuleInput, RuleOutput};
use crate::{engine::Severity, runes::RuneDisplay};
use serde::Serialize;

pub const KEY: &str = "festering_strike_waste";
const ABILITY: &str = "Festering Strike";
const WEIGHT: f64 = 2.0;
const EXEMPT_BUFFS: [&str; 3] = ["Bloodlust", "Heroism", "Time Warp"];

#[derive(Debug, Clone, Serialize)]
struct WasteEvent {
    timestamp:          u64,
    death_runes_wasted: u32,
    message:            String,
}

#[derive(Debug, Default)]
pub struct FesteringStrikeWaste {
    casts:                u32,
    one_death_rune_casts: u32,
    two_death_rune_casts: u32,
    waste_events:         Vec<WasteEvent>,
}

impl FesteringStrikeWaste {
    pub fn total_wasted(&self) -> u32 {
        self.one_death_rune_casts + 2 * self.two_death_rune_casts
    }
}

impl RotationRule for FesteringStrikeWaste {
    fn key(&self) -> &'static str {
        KEY
    }

    fn weight(&self) -> f64 {
        WEIGHT
    }

    fn observe(&mut self, input: &RuleInput, ctx: &RuleContext) -> RuleOutput {
        if !input.is_player_cast(ABILITY, ctx) || input.runes.runes_before.is_empty() {
            return vec![];
        }
        let ts = input.event.timestamp;
        self.casts += 1;

        if ctx.buffs.any_active(&EXEMPT_BUFFS, ts) {
            return vec![];
        }

        let blood = input.runes.available_before(RuneDisplay::Blood);
        let frost = input.runes.available_before(RuneDisplay::Frost);

        let (wasted, message) = match (blood > 0, frost > 0) {
            (true, true) => return vec![],
            (false, false) => {
                self.two_death_rune_casts += 1;
                (2, "Festering Strike cast with no Blood or Frost available (will use 2 death runes)".to_owned())
            }
            (blood_ready, _) => {
                self.one_death_rune_casts += 1;
                let missing = if blood_ready { "Frost" } else { "Blood" };
                (1, format!("Festering Strike cast without {} rune available (will use 1 death rune)", missing))
            }
        };

        self.waste_events.push(WasteEvent { timestamp: ts, death_runes_wasted: wasted, message: message.clone() });

        vec![advice(
            KEY,
            "Festering Strike on death runes",
            message,
            if wasted == 2 { Severity::Bad } else { Severity::Warn },
            vec![
                ("blood".to_owned(), blood.to_string()),
                ("frost".to_owned(), frost.to_string()),
                ("death_runes_wasted".to_owned(), wasted.to_string()),
            ],
            ts,
        )]
    }

    fn score(&self) -> Option<f64> {
        if self.casts == 0 {
            return None;
        }
        Some(match self.total_wasted() {
            0      => 1.0,
            1..=2  => 0.8,
            3..=5  => 0.6,
            _      => 0.3,
        })
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "one_death_rune_casts":     self.one_death_rune_casts,
            "two_death_rune_casts":     self.two_death_rune_casts,
            "total_death_runes_wasted": self.total_wasted(),
            "waste_events":             self.waste_events,
        })
    }
}
