/// Fight report: the analyzer's only output.
///
/// Serialized as JSON to a file or stdout. Annotated events keep the input
/// record's fields at the top level so a timeline viewer can read either.
use crate::{
    engine::AdviceEvent,
    parser::LogEvent,
    runes::{RuneAnnotation, RuneSnapshot},
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// One replayed event with the simulator's view of the runes around it.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedEvent {
    #[serde(flatten)]
    pub event: LogEvent,
    #[serde(flatten)]
    pub runes: RuneAnnotation,
    /// Tracked buffs active at the event's timestamp.
    pub buffs: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisSummary {
    pub spec:                 String,
    pub player_id:            Option<i64>,
    pub duration_ms:          u64,
    /// Some cast could not be paid even after resynchronizing.
    pub has_rune_spend_error: bool,
    pub num_rune_adjustments: u32,
    pub spend_errors:         u32,
    pub total_score:          Option<f64>,
    pub rule_scores:          BTreeMap<String, Option<f64>>,
    pub rule_reports:         BTreeMap<String, serde_json::Value>,
    /// Start of a pre-pull Army of the Dead, if one was detected.
    pub prepull_army_cast_at: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FightReport {
    pub summary:     AnalysisSummary,
    pub advice:      Vec<AdviceEvent>,
    pub events:      Vec<AnnotatedEvent>,
    pub final_runes: Vec<RuneSnapshot>,
}

pub fn to_json(report: &FightReport, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    Ok(json)
}

/// Write to `out`, or stdout when no path is given.
pub fn write_report(report: &FightReport, out: Option<&Path>, pretty: bool) -> Result<()> {
    let json = to_json(report, pretty)?;
    match out {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing report {:?}", path))?;
            tracing::info!("Report written to {:?}", path);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::EventKind;
    use crate::runes::{RuneCost, RuneDisplay};

    #[test]
    fn annotated_event_flattens_fields() {
        let event = AnnotatedEvent {
            event: LogEvent::new(1_500, EventKind::Cast, "Icy Touch").with_cost(RuneCost::new(0, 1, 0)),
            runes: RuneAnnotation {
                runes_before: vec![RuneSnapshot { name: RuneDisplay::Frost, is_available: true, regen_time: 0.0 }],
                runes_after:  vec![RuneSnapshot { name: RuneDisplay::Frost, is_available: false, regen_time: 11_500.0 }],
                spend_failed: false,
                resynchronized: true,
            },
            buffs: vec!["Unholy Presence".into()],
        };

        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["timestamp"], 1_500);
        assert_eq!(v["type"], "cast");
        assert_eq!(v["rune_cost"]["Frost"], 1);
        assert_eq!(v["runes_after"][0]["name"], "Frost");
        assert_eq!(v["runes_after"][0]["regen_time"], 11_500.0);
        assert_eq!(v["resynchronized"], true);
        assert_eq!(v["buffs"][0], "Unholy Presence");
    }

    #[test]
    fn writes_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut report = FightReport::default();
        report.summary.spec = "Frost".into();
        report.summary.total_score = Some(0.5);

        write_report(&report, Some(&path), false).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["summary"]["spec"], "Frost");
        assert_eq!(v["summary"]["total_score"], 0.5);
        assert!(!raw.contains('\n'));
    }
}
