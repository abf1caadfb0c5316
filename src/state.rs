/// Buff windows for the analyzed player, built in the preprocessing pass and
/// read during replay.
///
/// Rules only see the `BuffLookup` capability; `BuffTracker` is the interval
/// implementation the engine builds from apply/remove/refresh events.
use crate::parser::{Aura, EventKind, LogEvent};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Buffs whose windows are shown on annotated events.
pub const TRACKED_BUFFS: &[&str] = &[
    "Blood Presence",
    "Unholy Presence",
    "Frost Presence",
    "Pillar of Frost",
    "Bloodlust",
    "Heroism",
    "Time Warp",
    "Primal Rage",
    "Rime",
    "Killing Machine",
    "Sudden Doom",
    "Runic Corruption",
    "Unholy Frenzy",
    "Unholy Strength",
    "Berserking",
    "Blood Fury",
    "Blood Tap",
    "Synapse Springs",
    "Race Against Death",
];

const PRESENCES: [&str; 3] = ["Blood Presence", "Frost Presence", "Unholy Presence"];

/// Is Bloodlust or an equivalent raid haste effect up?
pub const RAID_HASTE_BUFFS: [&str; 4] = ["Bloodlust", "Heroism", "Time Warp", "Primal Rage"];

// ---------------------------------------------------------------------------
// Windows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuffWindow {
    pub start: u64,
    /// `None` while the buff is still up.
    pub end:   Option<u64>,
}

impl BuffWindow {
    pub fn contains(&self, timestamp: u64) -> bool {
        timestamp >= self.start && self.end.map_or(true, |end| timestamp <= end)
    }
}

/// Read-only buff queries used by the haste feed and rules.
pub trait BuffLookup {
    fn is_active(&self, buff: &str, timestamp: u64) -> bool;

    /// Closed windows for `buff`; a window still open at the end of the
    /// fight ends at the fight's last timestamp.
    fn windows(&self, buff: &str) -> Vec<BuffWindow>;

    /// Tracked buffs active at `timestamp`, presences first.
    fn active_at(&self, timestamp: u64) -> Vec<String>;

    fn any_active(&self, buffs: &[&str], timestamp: u64) -> bool {
        buffs.iter().any(|b| self.is_active(b, timestamp))
    }
}

// ---------------------------------------------------------------------------
// Interval tracker
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct BuffTracker {
    windows:  BTreeMap<String, Vec<BuffWindow>>,
    end_time: u64,
}

impl BuffTracker {
    pub fn new(starting_auras: &[Aura], end_time: u64) -> Self {
        let mut tracker = Self { windows: BTreeMap::new(), end_time };
        for aura in starting_auras.iter().filter(|a| !a.name.is_empty()) {
            let windows = tracker.windows.entry(aura.name.clone()).or_default();
            // The same presence can be listed twice
            if windows.is_empty() {
                windows.push(BuffWindow { start: 0, end: None });
            }
        }
        tracker
    }

    fn has_active_window(&self, buff: &str) -> bool {
        self.windows
            .get(buff)
            .and_then(|w| w.last())
            .is_some_and(|w| w.end.is_none())
    }

    pub fn observe(&mut self, event: &LogEvent) {
        if !event.is_buff_event() || event.ability.is_empty() {
            return;
        }
        let ts = event.timestamp;

        match event.kind {
            EventKind::ApplyBuff => {
                if !self.has_active_window(&event.ability) {
                    self.windows
                        .entry(event.ability.clone())
                        .or_default()
                        .push(BuffWindow { start: ts, end: None });
                }
            }
            EventKind::RemoveBuff => {
                let windows = self.windows.entry(event.ability.clone()).or_default();
                match windows.last_mut() {
                    Some(w) if w.end.is_none() => w.end = Some(ts),
                    Some(_) => {}
                    // Up before the log started
                    None => windows.push(BuffWindow { start: 0, end: Some(ts) }),
                }
            }
            _ => {
                // A refresh or stack change with no window: the buff was up
                // at the pull but missing from combatant info.
                if self.windows.get(&event.ability).map_or(true, Vec::is_empty) {
                    if PRESENCES.contains(&event.ability.as_str()) {
                        self.drop_open_presences();
                    }
                    self.windows
                        .entry(event.ability.clone())
                        .or_default()
                        .push(BuffWindow { start: 0, end: None });
                }
            }
        }
    }

    /// Only one presence can be up; a late-discovered presence replaces the
    /// one combatant info reported.
    fn drop_open_presences(&mut self) {
        for presence in PRESENCES {
            if let Some(windows) = self.windows.get_mut(presence) {
                if windows.last().is_some_and(|w| w.end.is_none()) {
                    windows.pop();
                }
            }
        }
    }

    pub fn has_window(&self, buff: &str) -> bool {
        self.windows.get(buff).is_some_and(|w| !w.is_empty())
    }

    /// Buffs already up when the fight started.
    pub fn open_at_start(&self) -> BTreeSet<String> {
        self.windows
            .iter()
            .filter(|(_, w)| w.first().is_some_and(|w| w.start == 0 && w.contains(0)))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl BuffLookup for BuffTracker {
    fn is_active(&self, buff: &str, timestamp: u64) -> bool {
        self.windows
            .get(buff)
            .is_some_and(|w| w.iter().any(|w| w.contains(timestamp)))
    }

    fn windows(&self, buff: &str) -> Vec<BuffWindow> {
        self.windows
            .get(buff)
            .map(|w| {
                w.iter()
                    .map(|w| BuffWindow { start: w.start, end: Some(w.end.unwrap_or(self.end_time)) })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn active_at(&self, timestamp: u64) -> Vec<String> {
        let mut active: Vec<(bool, u64, &str)> = TRACKED_BUFFS
            .iter()
            .filter_map(|&buff| {
                let window = self.windows.get(buff)?.iter().find(|w| w.contains(timestamp))?;
                Some((!buff.ends_with("Presence"), window.start, buff))
            })
            .collect();
        active.sort();

        let mut seen_presence = false;
        active
            .into_iter()
            .filter(|(not_presence, _, _)| {
                if *not_presence {
                    return true;
                }
                let keep = !seen_presence;
                seen_presence = true;
                keep
            })
            .map(|(_, _, buff)| buff.to_owned())
            .collect()
    }
}
