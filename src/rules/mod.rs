pub mod festering_strike_waste;
pub mod obliterate_rune_usage;

use crate::{
    engine::{AdviceEvent, Severity},
    parser::LogEvent,
    runes::RuneAnnotation,
    state::BuffLookup,
};

/// Read-only context passed to every rule.
pub struct RuleContext<'a> {
    pub buffs:     &'a dyn BuffLookup,
    pub player_id: Option<i64>,
}

/// The current event, already stamped by the rune tracker.
pub struct RuleInput<'a> {
    pub event: &'a LogEvent,
    pub runes: &'a RuneAnnotation,
}

impl RuleInput<'_> {
    /// A cast of `ability` by the analyzed player.
    pub fn is_player_cast(&self, ability: &str, ctx: &RuleContext) -> bool {
        self.event.is_cast_of(ability)
            && ctx.player_id.map_or(true, |id| self.event.source_id == Some(id))
    }
}

/// Rules return zero or more advice events.
/// Zero means the rule did not fire for this event.
pub type RuleOutput = Vec<AdviceEvent>;

/// A scoring heuristic fed every annotated event of the fight in order.
pub trait RotationRule: Send {
    fn key(&self) -> &'static str;

    /// Relative weight in the overall score.
    fn weight(&self) -> f64;

    fn observe(&mut self, input: &RuleInput, ctx: &RuleContext) -> RuleOutput;

    /// 0.0 – 1.0; `None` when the rule saw nothing to judge.
    fn score(&self) -> Option<f64>;

    fn report(&self) -> serde_json::Value;
}

/// Instantiate a rule by key. Unknown keys are skipped with a warning.
pub fn build(key: &str) -> Option<Box<dyn RotationRule>> {
    match key {
        festering_strike_waste::KEY => Some(Box::new(festering_strike_waste::FesteringStrikeWaste::default())),
        obliterate_rune_usage::KEY  => Some(Box::new(obliterate_rune_usage::ObliterateRuneUsage::default())),
        other => {
            tracing::warn!("Unknown rule {:?} in spec profile, skipping", other);
            None
        }
    }
}

/// Weighted mean of the rules that produced a score.
pub fn overall_score(rules: &[Box<dyn RotationRule>]) -> Option<f64> {
    let (sum, weight) = rules
        .iter()
        .filter_map(|r| r.score().map(|s| (s * r.weight(), r.weight())))
        .fold((0.0, 0.0), |(s, w), (rs, rw)| (s + rs, w + rw));

    (weight > 0.0).then(|| sum / weight)
}

// ---------------------------------------------------------------------------
// Convenience constructor so rules don't repeat boilerplate
// ---------------------------------------------------------------------------

pub fn advice(
    key:      &str,
    title:    &str,
    message:  String,
    severity: Severity,
    kv:       Vec<(String, String)>,
    now_ms:   u64,
) -> AdviceEvent {
    AdviceEvent {
        key:          key.to_owned(),
        title:        title.to_owned(),
        message,
        severity,
        kv,
        timestamp_ms: now_ms,
    }
}
