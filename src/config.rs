/// Analysis configuration: persisted as TOML, `rune-ledger.toml` by default.
///
/// Everything is optional: with no file the analyzer detects the player and
/// spec from the timeline and uses the spec profile's rune conversion rules.
///
///   player_id = 7
///   spec      = "Unholy"
///   log_dir   = "logs"
///   pretty    = true
///
///   [runes]
///   convert_blood        = true
///   starting_death_runes = "Blood"
use crate::runes::{ConversionRules, RuneType};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "rune-ledger.toml";
pub const TIMELINE_EXTENSION: &str = "jsonl";

// ---------------------------------------------------------------------------
// AnalysisConfig
// ---------------------------------------------------------------------------

/// Per-field overrides on top of the spec profile's conversion rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuneOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convert_blood:        Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convert_frost:        Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_death_runes: Option<RuneType>,
}

impl RuneOverrides {
    pub fn apply(&self, rules: &mut ConversionRules) {
        if let Some(v) = self.convert_blood {
            rules.convert_blood = v;
        }
        if let Some(v) = self.convert_frost {
            rules.convert_frost = v;
        }
        if self.starting_death_runes.is_some() {
            rules.starting_death_runes = self.starting_death_runes;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Source id of the analyzed player (unset = taken from the timeline)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<i64>,

    /// Spec profile name (unset = detected from signature casts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,

    #[serde(default)]
    pub runes: RuneOverrides,

    /// Directory for the rolling log file
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Pretty-print the JSON report
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_log_dir() -> PathBuf { PathBuf::from("logs") }

fn default_pretty() -> bool { true }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            player_id: None,
            spec:      None,
            runes:     RuneOverrides::default(),
            log_dir:   default_log_dir(),
            pretty:    default_pretty(),
        }
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

pub fn load_or_default(path: &Path) -> Result<AnalysisConfig> {
    if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {:?}", path))?;
        let cfg: AnalysisConfig = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Config parse error: {}", e))?;
        Ok(cfg)
    } else {
        Ok(AnalysisConfig::default())
    }
}

pub fn save(config: &AnalysisConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let raw = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("Config serialize error: {}", e))?;
    std::fs::write(path, raw)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Timeline discovery
// ---------------------------------------------------------------------------

/// Scans `dir` for `*.jsonl` timelines and returns the one with the most
/// recent `modified` timestamp.
pub fn find_latest_timeline(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;

    let mut best: Option<(PathBuf, std::time::SystemTime)> = None;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(TIMELINE_EXTENSION) {
            continue;
        }

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => continue,
        };

        match &best {
            None => best = Some((path, modified)),
            Some((_, best_time)) if modified > *best_time => best = Some((path, modified)),
            _ => {}
        }
    }

    if let Some((ref p, _)) = best {
        tracing::debug!("find_latest_timeline: selected {:?}", p);
    }
    best.map(|(p, _)| p)
}

/// A file argument is used as-is; a directory resolves to its newest timeline.
pub fn resolve_timeline(path: &Path) -> Result<PathBuf> {
    if path.is_dir() {
        find_latest_timeline(path)
            .with_context(|| format!("no .{} timeline found in {:?}", TIMELINE_EXTENSION, path))
    } else {
        Ok(path.to_path_buf())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    fn touch(path: &Path, secs: u64) {
        let f = File::create(path).unwrap();
        f.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)).unwrap();
    }

    #[test]
    fn round_trips_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut cfg = AnalysisConfig::default();
        cfg.player_id = Some(7);
        cfg.spec      = Some("Unholy".to_owned());
        cfg.runes.starting_death_runes = Some(RuneType::Blood);
        cfg.pretty    = false;

        save(&cfg, &path).unwrap();

        let loaded = load_or_default(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn returns_default_when_missing() {
        let dir = tempdir().unwrap();
        let cfg = load_or_default(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(cfg, AnalysisConfig::default());
        assert_eq!(cfg.log_dir, PathBuf::from("logs"));
        assert!(cfg.pretty);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "player_id = 12\n\n[runes]\nconvert_frost = true\n").unwrap();

        let cfg = load_or_default(&path).unwrap();
        assert_eq!(cfg.player_id, Some(12));
        assert_eq!(cfg.runes.convert_frost, Some(true));
        assert!(cfg.runes.convert_blood.is_none());
        assert!(cfg.pretty);
    }

    #[test]
    fn rejects_malformed_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "player_id = \"seven\"").unwrap();
        assert!(load_or_default(&path).is_err());
    }

    #[test]
    fn overrides_only_touch_set_fields() {
        let mut rules = ConversionRules { convert_blood: true, ..ConversionRules::default() };
        let overrides = RuneOverrides { convert_frost: Some(true), ..RuneOverrides::default() };
        overrides.apply(&mut rules);
        assert!(rules.convert_blood);
        assert!(rules.convert_frost);
        assert!(rules.starting_death_runes.is_none());
    }

    #[test]
    fn find_latest_timeline_picks_newest() {
        let dir = tempdir().unwrap();
        let older = dir.path().join("fight_1.jsonl");
        let newer = dir.path().join("fight_2.jsonl");
        touch(&newer, 2_000);
        touch(&older, 1_000);
        touch(&dir.path().join("notes.txt"), 3_000);

        assert_eq!(find_latest_timeline(dir.path()).unwrap(), newer);
        assert_eq!(resolve_timeline(dir.path()).unwrap(), newer);
        assert_eq!(resolve_timeline(&older).unwrap(), older);
    }

    #[test]
    fn empty_dir_has_no_timeline() {
        let dir = tempdir().unwrap();
        assert!(find_latest_timeline(dir.path()).is_none());
        assert!(resolve_timeline(dir.path()).is_err());
    }
}
