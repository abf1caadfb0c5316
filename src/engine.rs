/// Fight analyzer: the "brain" of the pipeline.
///
/// Collects the parsed events of one fight, then works in two passes:
///
///   1. preprocessing: resolve the player and spec, build buff windows and
///      look for a pre-pull Army of the Dead;
///   2. replay: every event touching the player goes through the haste feed,
///      then the rune tracker, then every rule the spec enables.
///
/// The replay is a pure function of the event list; a fresh tracker is built
/// for every fight.
use crate::{
    combatant,
    config::AnalysisConfig,
    parser::LogEvent,
    report::{AnalysisSummary, AnnotatedEvent, FightReport},
    rules::{self, RotationRule, RuleContext, RuleInput},
    runes::{prepull::PrepullArmy, RuneHasteFeed, RuneTracker},
    specs::{self, SpecProfile},
    state::{BuffLookup, BuffTracker},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc::Receiver;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Good,
    Warn,
    Bad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceEvent {
    pub key:          String,
    pub title:        String,
    pub message:      String,
    pub severity:     Severity,
    pub kv:           Vec<(String, String)>,
    pub timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Main engine task
// ---------------------------------------------------------------------------

/// Drain the event channel, then analyze everything received as one fight.
pub async fn run(mut event_rx: Receiver<LogEvent>, config: AnalysisConfig) -> Result<FightReport> {
    let mut events = Vec::new();
    while let Some(event) = event_rx.recv().await {
        events.push(event);
    }
    tracing::info!("Engine received {} events", events.len());
    analyze_fight(events, &config)
}

fn select_profile(events: &[&LogEvent], config: &AnalysisConfig) -> Result<SpecProfile> {
    match &config.spec {
        Some(name) => specs::load_spec(name).with_context(|| {
            let known: Vec<String> = specs::list_all().into_iter().map(|s| s.spec).collect();
            format!("unknown spec {:?} (known: {})", name, known.join(", "))
        }),
        None => specs::detect(events.iter().copied()).context("no default spec profile embedded"),
    }
}

pub fn analyze_fight(mut events: Vec<LogEvent>, config: &AnalysisConfig) -> Result<FightReport> {
    // Stable: equal timestamps keep log order
    events.sort_by_key(|e| e.timestamp);
    let end_time = events.last().map_or(0, |e| e.timestamp);

    // -----------------------------------------------------------------------
    // Preprocessing
    // -----------------------------------------------------------------------
    let combatant = combatant::resolve(&events, config.player_id);
    let player_events: Vec<&LogEvent> = events.iter().filter(|e| combatant.is_relevant(e)).collect();
    let profile = select_profile(&player_events, config)?;

    let mut conversion = profile.runes.clone();
    config.runes.apply(&mut conversion);
    tracing::info!(
        "Spec {} (convert blood: {}, convert frost: {}, starting death runes: {:?})",
        profile.spec_name, conversion.convert_blood, conversion.convert_frost, conversion.starting_death_runes
    );

    let mut buffs = BuffTracker::new(&combatant.auras, end_time);
    let mut army = PrepullArmy::new();
    for event in &player_events {
        buffs.observe(event);
        // Ghouls have their own source ids, listed among the player's pets
        if combatant.is_pet_event(event) {
            army.observe(event);
        }
    }

    let mut tracker = RuneTracker::new(conversion)?;
    army.apply(&mut tracker);

    let starting_buffs = buffs.open_at_start();
    let mut haste = RuneHasteFeed::new(
        combatant.haste_rating,
        starting_buffs.iter().map(String::as_str),
    );
    haste.seed(&mut tracker);

    let mut active_rules: Vec<Box<dyn RotationRule>> =
        profile.rules.iter().filter_map(|key| rules::build(key)).collect();

    // -----------------------------------------------------------------------
    // Replay
    // -----------------------------------------------------------------------
    let ctx = RuleContext { buffs: &buffs, player_id: combatant.player_id };
    let mut annotated = Vec::with_capacity(player_events.len());
    let mut advice = Vec::new();
    let mut adjustments = 0u32;
    let mut spend_errors = 0u32;

    for event in player_events {
        haste.observe(event, &mut tracker);
        let runes = tracker.process(event)?;

        if runes.resynchronized {
            adjustments += 1;
        }
        if runes.spend_failed {
            spend_errors += 1;
            tracing::warn!("Could not pay {} at {}ms even after resync", event.ability, event.timestamp);
        }

        let input = RuleInput { event, runes: &runes };
        for rule in active_rules.iter_mut() {
            advice.extend(rule.observe(&input, &ctx));
        }

        annotated.push(AnnotatedEvent {
            event: event.clone(),
            runes,
            buffs: buffs.active_at(event.timestamp),
        });
    }

    // -----------------------------------------------------------------------
    // Summary
    // -----------------------------------------------------------------------
    let rule_scores: BTreeMap<String, Option<f64>> =
        active_rules.iter().map(|r| (r.key().to_owned(), r.score())).collect();
    let rule_reports: BTreeMap<String, serde_json::Value> =
        active_rules.iter().map(|r| (r.key().to_owned(), r.report())).collect();
    let total_score = rules::overall_score(&active_rules);

    tracing::info!(
        "Replayed {} events: {} rune adjustments, {} spend errors, score {:?}",
        annotated.len(), adjustments, spend_errors, total_score
    );

    Ok(FightReport {
        summary: AnalysisSummary {
            spec:                 profile.spec_name,
            player_id:            combatant.player_id,
            duration_ms:          end_time,
            has_rune_spend_error: spend_errors > 0,
            num_rune_adjustments: adjustments,
            spend_errors,
            total_score,
            rule_scores,
            rule_reports,
            prepull_army_cast_at: army.cast_at(),
        },
        advice,
        events: annotated,
        final_runes: tracker.snapshot(end_time),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Aura, EventKind};
    use crate::runes::{RuneCost, RuneDisplay};

    fn cast(ts: u64, ability: &str, cost: RuneCost) -> LogEvent {
        LogEvent::new(ts, EventKind::Cast, ability).with_source(7).with_cost(cost)
    }

    fn combatant_info(auras: &[&str]) -> LogEvent {
        let mut e = LogEvent::new(0, EventKind::CombatantInfo, "").with_source(7);
        e.haste_melee = Some(0.0);
        e.auras = auras.iter().map(|n| Aura { name: (*n).into(), ability: 0 }).collect();
        e
    }

    #[test]
    fn unholy_fight_scores_festering_waste() {
        let events = vec![
            combatant_info(&[]),
            cast(0, "Summon Gargoyle", RuneCost::default()),
            cast(1_000, "Festering Strike", RuneCost::new(1, 1, 0)),
            cast(2_000, "Festering Strike", RuneCost::new(1, 1, 0)),
            // Only the converted runes are back: this one eats death runes
            cast(11_000, "Festering Strike", RuneCost::new(1, 1, 0)),
        ];

        let report = analyze_fight(events, &AnalysisConfig::default()).unwrap();
        assert_eq!(report.summary.spec, "Unholy");
        assert_eq!(report.summary.player_id, Some(7));
        assert!(!report.summary.has_rune_spend_error);
        assert_eq!(report.summary.num_rune_adjustments, 0);

        let third = &report.events[4];
        assert_eq!(third.runes.available_before(RuneDisplay::Blood), 0);
        assert_eq!(third.runes.available_before(RuneDisplay::Death), 2);
        assert_eq!(report.summary.rule_scores["festering_strike_waste"], Some(0.8));
        assert_eq!(report.advice.len(), 1);
    }

    #[test]
    fn resync_is_counted_not_fatal() {
        let events = vec![
            combatant_info(&[]),
            cast(0, "Howling Blast", RuneCost::new(0, 1, 0)),
            cast(100, "Howling Blast", RuneCost::new(0, 1, 0)),
            // The log says a third Frost rune was there
            cast(200, "Howling Blast", RuneCost::new(0, 1, 0)),
        ];

        let report = analyze_fight(events, &AnalysisConfig::default()).unwrap();
        assert_eq!(report.summary.spec, "Frost");
        assert_eq!(report.summary.num_rune_adjustments, 1);
        assert!(report.events[3].runes.resynchronized);
        assert!(!report.events[3].runes.spend_failed);
    }

    #[test]
    fn starting_unholy_presence_speeds_up_runes() {
        let events = vec![
            combatant_info(&["Unholy Presence"]),
            cast(0, "Icy Touch", RuneCost::new(0, 1, 0)),
        ];
        let report = analyze_fight(events, &AnalysisConfig::default()).unwrap();
        let regen = report.events[1].runes.runes_after[2].regen_time;
        assert!((regen - 10_000.0 / 1.15).abs() < 1e-6);
        assert_eq!(report.events[1].buffs, vec!["Unholy Presence".to_owned()]);
    }

    #[test]
    fn other_players_events_are_not_replayed() {
        let events = vec![
            combatant_info(&[]),
            cast(0, "Icy Touch", RuneCost::new(0, 1, 0)),
            LogEvent::new(10, EventKind::Cast, "Icy Touch")
                .with_source(99)
                .with_cost(RuneCost::new(0, 2, 0)),
        ];
        let report = analyze_fight(events, &AnalysisConfig::default()).unwrap();
        assert_eq!(report.events.len(), 2);
        assert_eq!(report.summary.num_rune_adjustments, 0);
    }

    fn buff_on(ts: u64, ability: &str, target: i64) -> LogEvent {
        let mut e = LogEvent::new(ts, EventKind::ApplyBuff, ability).with_source(7);
        e.target_id = Some(target);
        e
    }

    fn ghouls(owner_pet: i64) -> Vec<LogEvent> {
        (1..=8)
            .map(|i| {
                let mut e = LogEvent::new(100 + i as u64, EventKind::Damage, "Claw").with_source(owner_pet);
                e.target_id = Some(500);
                e.source = Some("Army of the Dead".into());
                e.source_instance = Some(i);
                e.source_dies_at = Some(38_500);
                e
            })
            .collect()
    }

    #[test]
    fn haste_buff_cast_on_an_ally_does_not_speed_up_runes() {
        let events = vec![
            combatant_info(&[]),
            cast(0, "Icy Touch", RuneCost::new(0, 1, 0)),
            buff_on(1_000, "Unholy Frenzy", 99),
        ];
        let report = analyze_fight(events, &AnalysisConfig::default()).unwrap();

        assert_eq!(report.final_runes[2].regen_time, 10_000.0);
        assert_eq!(report.events.len(), 2);
        assert!(report.events.iter().all(|e| e.buffs.is_empty()));
    }

    #[test]
    fn haste_buff_on_the_player_speeds_up_runes() {
        let events = vec![
            combatant_info(&[]),
            cast(0, "Icy Touch", RuneCost::new(0, 1, 0)),
            buff_on(1_000, "Unholy Frenzy", 7),
        ];
        let report = analyze_fight(events, &AnalysisConfig::default()).unwrap();

        assert!((report.final_runes[2].regen_time - 8_500.0).abs() < 1e-6);
        assert_eq!(report.events[2].buffs, vec!["Unholy Frenzy".to_owned()]);
    }

    #[test]
    fn own_prepull_army_primes_the_runes() {
        let mut info = combatant_info(&[]);
        info.pets = vec![31];
        let mut events = vec![info];
        events.extend(ghouls(31));

        let report = analyze_fight(events, &AnalysisConfig::default()).unwrap();
        assert_eq!(report.summary.prepull_army_cast_at, Some(-6_000.0));
        assert_eq!(report.final_runes[0].regen_time, 4_000.0);
        assert_eq!(report.final_runes[1].regen_time, 0.0);
    }

    #[test]
    fn another_players_army_is_ignored() {
        let mut info = combatant_info(&[]);
        info.pets = vec![31];
        let mut events = vec![info];
        // Same ghouls, hitting the player, but owned by someone else
        let mut foreign = ghouls(45);
        for g in &mut foreign {
            g.target_id = Some(7);
        }
        events.extend(foreign);

        let report = analyze_fight(events, &AnalysisConfig::default()).unwrap();
        assert_eq!(report.summary.prepull_army_cast_at, None);
        assert!(report.final_runes.iter().all(|r| r.regen_time == 0.0));
    }

    #[test]
    fn unknown_spec_override_is_an_error() {
        let cfg = AnalysisConfig { spec: Some("Blood".into()), ..AnalysisConfig::default() };
        let err = analyze_fight(vec![combatant_info(&[])], &cfg).unwrap_err();
        assert!(err.to_string().contains("unknown spec"));
    }

    #[test]
    fn config_overrides_spec_conversion() {
        let mut cfg = AnalysisConfig { spec: Some("Frost".into()), ..AnalysisConfig::default() };
        cfg.runes.starting_death_runes = Some(crate::runes::RuneType::Blood);

        let report = analyze_fight(vec![combatant_info(&[])], &cfg).unwrap();
        let deaths = report.final_runes.iter().filter(|r| r.name == RuneDisplay::Death).count();
        assert_eq!(deaths, 2);
    }

    #[tokio::test]
    async fn run_collects_channel_then_analyzes() {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tx.send(combatant_info(&[])).await.unwrap();
        tx.send(cast(0, "Howling Blast", RuneCost::new(0, 1, 0))).await.unwrap();
        drop(tx);

        let report = run(rx, AnalysisConfig::default()).await.unwrap();
        assert_eq!(report.events.len(), 2);
        assert_eq!(report.summary.spec, "Frost");
    }
}
