/// Parses normalized timeline lines into typed `LogEvent` structs.
///
/// Each line of a timeline file is one JSON object, already fetched and
/// normalized from the log service:
///
///   {"timestamp":1520,"type":"cast","sourceID":7,"targetID":31,
///    "ability":"Obliterate","abilityGameID":49020,
///    "rune_cost":{"Frost":1,"Unholy":1}}
///
/// Timestamps are milliseconds relative to the fight start. Pet events carry
/// `source`, `sourceInstance` and `source_dies_at`; `combatantinfo` records
/// carry `hasteMelee`, the starting `auras` and the ids of the player's `pets`.
use crate::runes::RuneCost;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Cast,
    ApplyBuff,
    RemoveBuff,
    RemoveBuffStack,
    RefreshBuff,
    ApplyDebuff,
    RemoveDebuff,
    RefreshDebuff,
    Damage,
    CombatantInfo,
    #[serde(other)]
    Other,
}

/// An aura present when the fight started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aura {
    #[serde(default)]
    pub name:    String,
    #[serde(default)]
    pub ability: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub kind:      EventKind,
    #[serde(rename = "sourceID", default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<i64>,
    #[serde(rename = "targetID", default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<i64>,
    #[serde(default)]
    pub ability:   String,
    #[serde(rename = "abilityGameID", default)]
    pub ability_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rune_cost: Option<RuneCost>,

    // Pet metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source:          Option<String>,
    #[serde(rename = "sourceInstance", default, skip_serializing_if = "Option::is_none")]
    pub source_instance: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_dies_at:  Option<u64>,

    // combatantinfo only
    #[serde(rename = "hasteMelee", default, skip_serializing_if = "Option::is_none")]
    pub haste_melee: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auras:       Vec<Aura>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pets:        Vec<i64>,
}

impl LogEvent {
    pub fn new(timestamp: u64, kind: EventKind, ability: &str) -> Self {
        Self {
            timestamp,
            kind,
            source_id:       None,
            target_id:       None,
            ability:         ability.to_owned(),
            ability_id:      0,
            rune_cost:       None,
            source:          None,
            source_instance: None,
            source_dies_at:  None,
            haste_melee:     None,
            auras:           Vec::new(),
            pets:            Vec::new(),
        }
    }

    pub fn with_cost(mut self, cost: RuneCost) -> Self {
        self.rune_cost = Some(cost);
        self
    }

    pub fn with_source(mut self, source_id: i64) -> Self {
        self.source_id = Some(source_id);
        self
    }

    pub fn with_ability_id(mut self, ability_id: u32) -> Self {
        self.ability_id = ability_id;
        self
    }

    /// Rune cost, if the event carries a non-empty one.
    pub fn cost(&self) -> Option<RuneCost> {
        self.rune_cost.filter(|c| !c.is_empty())
    }

    pub fn is_cast_of(&self, ability: &str) -> bool {
        self.kind == EventKind::Cast && self.ability == ability
    }

    pub fn is_buff_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ApplyBuff | EventKind::RemoveBuff | EventKind::RemoveBuffStack | EventKind::RefreshBuff
        )
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse one timeline line. Blank lines give `Ok(None)`; malformed JSON is an
/// error the caller decides how to report.
pub fn parse_line(raw: &str) -> Result<Option<LogEvent>> {
    let line = raw.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let event = serde_json::from_str(line)?;
    Ok(Some(event))
}

/// Async pipeline task: receive raw lines, parse, forward typed events.
pub async fn run(mut rx: Receiver<String>, tx: Sender<LogEvent>) -> Result<()> {
    let mut line_no = 0usize;
    let mut skipped = 0usize;

    while let Some(line) = rx.recv().await {
        line_no += 1;
        match parse_line(&line) {
            Ok(Some(event)) => {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                skipped += 1;
                tracing::warn!("Skipping malformed timeline line {}: {}", line_no, e);
            }
        }
    }

    if skipped > 0 {
        tracing::info!("Parser finished: {} lines, {} skipped", line_no, skipped);
    }
    Ok(())
}
