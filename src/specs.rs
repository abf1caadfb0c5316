/// Spec profile library: embedded at compile time from `data/specs/*.toml`.
///
/// A profile carries the rune conversion rules the tracker runs with, the
/// signature abilities used to recognize the spec from a timeline, and the
/// rotation rules that apply to it. Embedding the files at compile time means
/// no runtime path resolution is needed.
use crate::parser::{EventKind, LogEvent};
use crate::runes::ConversionRules;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Embedded TOML data
// ---------------------------------------------------------------------------

const UNHOLY:  &str = include_str!("../data/specs/unholy.toml");
const FROST:   &str = include_str!("../data/specs/frost.toml");
const DEFAULT: &str = include_str!("../data/specs/default.toml");

static ALL_SPEC_DATA: &[&str] = &[UNHOLY, FROST, DEFAULT];

pub const DEFAULT_SPEC: &str = "Default";

// ---------------------------------------------------------------------------
// TOML deserialization structs (private)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TomlFile {
    spec:      TomlSpecMeta,
    #[serde(default)]
    detection: TomlDetection,
    #[serde(default)]
    runes:     ConversionRules,
    #[serde(default)]
    rules:     TomlRules,
}

#[derive(Deserialize)]
struct TomlSpecMeta {
    class:       String,
    spec:        String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize, Default)]
struct TomlDetection {
    #[serde(default)]
    signature_abilities: Vec<String>,
}

#[derive(Deserialize, Default)]
struct TomlRules {
    #[serde(default)]
    enabled: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SpecProfile {
    pub class:               String,
    pub spec_name:           String,
    pub description:         String,
    /// A cast of any of these marks the timeline as this spec.
    pub signature_abilities: Vec<String>,
    pub runes:               ConversionRules,
    /// Rule keys evaluated for this spec.
    pub rules:               Vec<String>,
}

/// Lightweight descriptor for `--spec` help and error messages.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SpecInfo {
    pub class:       String,
    pub spec:        String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_all() -> Vec<SpecProfile> {
    ALL_SPEC_DATA
        .iter()
        .filter_map(|toml_str| {
            let file: TomlFile = toml::from_str(toml_str)
                .map_err(|e| tracing::warn!("Failed to parse spec TOML: {}", e))
                .ok()?;
            Some(SpecProfile {
                class:               file.spec.class,
                spec_name:           file.spec.spec,
                description:         file.spec.description,
                signature_abilities: file.detection.signature_abilities,
                runes:               file.runes,
                rules:               file.rules.enabled,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn list_all() -> Vec<SpecInfo> {
    parse_all()
        .into_iter()
        .map(|p| SpecInfo {
            class:       p.class,
            spec:        p.spec_name,
            description: p.description,
        })
        .collect()
}

/// Load a spec profile by name (case-insensitive).
pub fn load_spec(spec_name: &str) -> Option<SpecProfile> {
    parse_all()
        .into_iter()
        .find(|p| p.spec_name.eq_ignore_ascii_case(spec_name))
}

/// The spec whose signature ability is cast first, else the default profile.
pub fn detect<'a>(events: impl IntoIterator<Item = &'a LogEvent>) -> Option<SpecProfile> {
    let profiles = parse_all();

    let detected = events
        .into_iter()
        .filter(|e| e.kind == EventKind::Cast)
        .find_map(|e| {
            profiles
                .iter()
                .find(|p| p.signature_abilities.iter().any(|a| *a == e.ability))
                .cloned()
        });

    match detected {
        Some(p) => {
            tracing::info!("Detected spec {}", p.spec_name);
            Some(p)
        }
        None => {
            tracing::info!("No signature ability cast; using the {} profile", DEFAULT_SPEC);
            profiles.into_iter().find(|p| p.spec_name == DEFAULT_SPEC)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    fn cast(ts: u64, ability: &str) -> LogEvent {
        LogEvent::new(ts, EventKind::Cast, ability)
    }

    #[test]
    fn lists_three_specs() {
        let specs = list_all();
        assert_eq!(specs.len(), 3);
        let names: Vec<&str> = specs.iter().map(|s| s.spec.as_str()).collect();
        assert!(names.contains(&"Unholy"));
        assert!(names.contains(&"Frost"));
        assert!(names.contains(&"Default"));
    }

    #[test]
    fn unholy_converts_both_types() {
        let p = load_spec("Unholy").expect("should load");
        assert!(p.runes.convert_blood);
        assert!(p.runes.convert_frost);
        assert!(p.runes.blood_converting.iter().any(|a| a == "Pestilence"));
        assert_eq!(p.runes.frost_converting, vec!["Festering Strike".to_owned()]);
        assert_eq!(p.rules, vec!["festering_strike_waste".to_owned()]);
    }

    #[test]
    fn frost_keeps_default_ability_lists() {
        let p = load_spec("frost").expect("case-insensitive");
        assert!(!p.runes.convert_blood);
        assert!(!p.runes.convert_frost);
        assert_eq!(p.runes.blood_converting, ConversionRules::default().blood_converting);
    }

    #[test]
    fn detects_from_first_signature_cast() {
        let events = vec![
            cast(0, "Plague Strike"),
            cast(1_000, "Howling Blast"),
            cast(2_000, "Summon Gargoyle"),
        ];
        assert_eq!(detect(&events).unwrap().spec_name, "Frost");
    }

    #[test]
    fn applied_buffs_do_not_count_as_casts() {
        let events = vec![LogEvent::new(0, EventKind::ApplyBuff, "Unholy Frenzy")];
        assert_eq!(detect(&events).unwrap().spec_name, DEFAULT_SPEC);
    }

    #[test]
    fn returns_none_for_unknown() {
        assert!(load_spec("Blood").is_none());
    }
}
