/// Judges Obliterate for Masterfrost play: no Obliterate while Rime is up,
/// and death runes should pay the Frost half of the cost.
///
/// Rune choices are read from the tracker's before/after snapshots on the
/// cast. Only casts that consumed exactly two runes with a death rune ready
/// are judged.
use super::{advice, RotationRule, RuleContext, RuleInput, RuleOutput};
use crate::{engine::Severity, runes::RuneDisplay};
use serde::Serialize;

pub const KEY: &str = "obliterate_rune_usage";
const ABILITY: &str = "Obliterate";
const RIME: &str = "Rime";
const WEIGHT: f64 = 2.0;

#[derive(Debug, Clone, Serialize)]
struct BadUsage {
    timestamp: u64,
    message:   String,
}

#[derive(Debug, Default)]
pub struct ObliterateRuneUsage {
    total:            u32,
    during_rime:      u32,
    bad_rune_choices: u32,
    events:           Vec<BadUsage>,
}

impl ObliterateRuneUsage {
    fn bad_usages(&self) -> u32 {
        self.during_rime + self.bad_rune_choices
    }
}

/// What went wrong with the rune choice, if anything.
fn judge_runes(input: &RuleInput) -> Option<&'static str> {
    let runes = input.runes;
    if runes.runes_before.is_empty() || runes.runes_after.is_empty() {
        return None;
    }

    let unholy_available = runes.available_before(RuneDisplay::Unholy);
    let frost_available  = runes.available_before(RuneDisplay::Frost);
    let death_available  = runes.available_before(RuneDisplay::Death);

    let unholy = runes.consumed(RuneDisplay::Unholy);
    let frost  = runes.consumed(RuneDisplay::Frost);
    let death  = runes.consumed(RuneDisplay::Death);

    if unholy + frost + death != 2 || death_available == 0 {
        return None;
    }

    if frost > 0 && unholy > 0 && death == 0 {
        Some("Frost and Unholy")
    } else if death == 2 && (unholy_available > 0 || frost_available > 0) {
        Some("2 Deaths")
    } else if death > 0 && frost > 0 && unholy_available > 0 {
        Some("Death and Frost")
    } else {
        None
    }
}

impl RotationRule for ObliterateRuneUsage {
    fn key(&self) -> &'static str {
        KEY
    }

    fn weight(&self) -> f64 {
        WEIGHT
    }

    fn observe(&mut self, input: &RuleInput, ctx: &RuleContext) -> RuleOutput {
        if !input.is_player_cast(ABILITY, ctx) {
            return vec![];
        }
        let ts = input.event.timestamp;
        self.total += 1;

        let mut out = Vec::new();

        if ctx.buffs.is_active(RIME, ts) {
            self.during_rime += 1;
            out.push(advice(
                KEY,
                "Obliterate during Rime",
                "Obliterate cast while Rime was up; spend Rime on Howling Blast first".to_owned(),
                Severity::Warn,
                vec![],
                ts,
            ));
        }

        if let Some(used) = judge_runes(input) {
            self.bad_rune_choices += 1;
            let message = format!("Obliterate used with {}", used);
            self.events.push(BadUsage { timestamp: ts, message: message.clone() });
            out.push(advice(
                KEY,
                "Obliterate rune choice",
                message,
                Severity::Warn,
                vec![("runes".to_owned(), used.to_owned())],
                ts,
            ));
        }

        out
    }

    fn score(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(match self.bad_usages() {
            0 => 1.0,
            1 => 0.5,
            _ => 0.0,
        })
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "total_obliterates": self.total,
            "during_rime":       self.during_rime,
            "bad_rune_choices":  self.bad_rune_choices,
            "death_rune_events": self.events,
        })
    }
}
