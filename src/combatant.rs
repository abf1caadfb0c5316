/// Who is being analyzed, and what they walked into the pull with.
///
/// The timeline's `combatantinfo` record gives haste rating and starting
/// auras. The player id comes from configuration when set; otherwise it is
/// taken from the combatant record, and failing that from the first cast
/// that paid runes.
///
/// Events belong to the player when the player or one of their pets is the
/// source or target. Buffs count only when they land on the player or a pet.
use crate::parser::{Aura, EventKind, LogEvent};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombatantInfo {
    pub player_id:    Option<i64>,
    pub haste_rating: f64,
    pub auras:        Vec<Aura>,
    pub pets:         Vec<i64>,
}

impl CombatantInfo {
    pub fn is_known(&self) -> bool {
        self.player_id.is_some()
    }

    pub fn aura_names(&self) -> impl Iterator<Item = &str> {
        self.auras
            .iter()
            .filter(|a| !a.name.is_empty())
            .map(|a| a.name.as_str())
    }

    /// The player or one of their pets.
    pub fn owns(&self, id: Option<i64>) -> bool {
        match (self.player_id, id) {
            (Some(player), Some(id)) => id == player || self.pets.contains(&id),
            _ => false,
        }
    }

    /// Whether `event` is part of the analyzed player's timeline. With no
    /// known player every event is.
    pub fn is_relevant(&self, event: &LogEvent) -> bool {
        if self.player_id.is_none() {
            return true;
        }
        if !self.owns(event.source_id) && !self.owns(event.target_id) {
            return false;
        }
        // A buff cast on someone else
        !(event.is_buff_event() && event.target_id.is_some() && !self.owns(event.target_id))
    }

    /// Whether `event` comes from one of the player's pets.
    pub fn is_pet_event(&self, event: &LogEvent) -> bool {
        match self.player_id {
            None => true,
            Some(_) => event.source_id.map_or(false, |id| self.pets.contains(&id)),
        }
    }
}

fn is_combatant_record(event: &LogEvent, player_id: Option<i64>) -> bool {
    event.kind == EventKind::CombatantInfo
        && match player_id {
            Some(id) => event.source_id == Some(id),
            None => true,
        }
}

pub fn resolve(events: &[LogEvent], configured_player: Option<i64>) -> CombatantInfo {
    let record = events.iter().find(|e| is_combatant_record(e, configured_player));

    let player_id = configured_player
        .or_else(|| record.and_then(|r| r.source_id))
        .or_else(|| {
            events
                .iter()
                .find(|e| e.kind == EventKind::Cast && e.cost().is_some())
                .and_then(|e| e.source_id)
        });

    match player_id {
        Some(id) => tracing::info!("Analyzing player {}", id),
        None => tracing::warn!("Could not determine the player; analyzing every event"),
    }
    if record.is_none() {
        tracing::warn!("No combatantinfo record; assuming zero haste rating and no starting auras");
    }

    CombatantInfo {
        player_id,
        haste_rating: record.and_then(|r| r.haste_melee).unwrap_or(0.0),
        auras:        record.map(|r| r.auras.clone()).unwrap_or_default(),
        pets:         record.map(|r| r.pets.clone()).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runes::RuneCost;

    fn info(source: i64, haste: f64, auras: &[&str]) -> LogEvent {
        let mut e = LogEvent::new(0, EventKind::CombatantInfo, "").with_source(source);
        e.haste_melee = Some(haste);
        e.auras = auras.iter().map(|n| Aura { name: (*n).into(), ability: 0 }).collect();
        e
    }

    #[test]
    fn takes_player_from_combatant_record() {
        let events = vec![info(7, 1_200.0, &["Unholy Presence"])];
        let c = resolve(&events, None);
        assert_eq!(c.player_id, Some(7));
        assert_eq!(c.haste_rating, 1_200.0);
        assert_eq!(c.aura_names().collect::<Vec<_>>(), vec!["Unholy Presence"]);
    }

    #[test]
    fn configured_player_selects_matching_record() {
        let events = vec![info(3, 100.0, &[]), info(7, 900.0, &["Frost Presence"])];
        let c = resolve(&events, Some(7));
        assert_eq!(c.player_id, Some(7));
        assert_eq!(c.haste_rating, 900.0);
    }

    #[test]
    fn falls_back_to_first_rune_cast() {
        let events = vec![
            LogEvent::new(10, EventKind::Cast, "Horn of Winter").with_source(4),
            LogEvent::new(20, EventKind::Cast, "Obliterate")
                .with_source(9)
                .with_cost(RuneCost::new(0, 1, 1)),
        ];
        let c = resolve(&events, None);
        assert_eq!(c.player_id, Some(9));
        assert_eq!(c.haste_rating, 0.0);
        assert!(c.is_known());
    }

    fn buff(kind: EventKind, source: i64, target: Option<i64>) -> LogEvent {
        let mut e = LogEvent::new(1_000, kind, "Unholy Frenzy").with_source(source);
        e.target_id = target;
        e
    }

    fn with_pets() -> CombatantInfo {
        let mut record = info(7, 0.0, &[]);
        record.pets = vec![31];
        resolve(&[record], None)
    }

    #[test]
    fn takes_pets_from_combatant_record() {
        let c = with_pets();
        assert_eq!(c.pets, vec![31]);
        assert!(c.owns(Some(7)));
        assert!(c.owns(Some(31)));
        assert!(!c.owns(Some(99)));
        assert!(!c.owns(None));
    }

    #[test]
    fn buffs_on_allies_are_not_the_players() {
        let c = with_pets();
        assert!(!c.is_relevant(&buff(EventKind::ApplyBuff, 7, Some(99))));
        assert!(!c.is_relevant(&buff(EventKind::RemoveBuff, 7, Some(99))));
        assert!(c.is_relevant(&buff(EventKind::ApplyBuff, 7, Some(7))));
        assert!(c.is_relevant(&buff(EventKind::ApplyBuff, 7, Some(31))));
        assert!(c.is_relevant(&buff(EventKind::ApplyBuff, 99, Some(7))));
        assert!(c.is_relevant(&buff(EventKind::ApplyBuff, 7, None)));
    }

    #[test]
    fn casts_and_pet_events_are_relevant() {
        let c = with_pets();
        let mut cast = LogEvent::new(0, EventKind::Cast, "Icy Touch").with_source(7);
        cast.target_id = Some(500);
        assert!(c.is_relevant(&cast));

        let mut claw = LogEvent::new(0, EventKind::Damage, "Claw").with_source(31);
        claw.target_id = Some(500);
        assert!(c.is_relevant(&claw));
        assert!(c.is_pet_event(&claw));

        let other = LogEvent::new(0, EventKind::Damage, "Claw").with_source(45);
        assert!(!c.is_relevant(&other));
        assert!(!c.is_pet_event(&other));
        assert!(!c.is_pet_event(&cast));
    }

    #[test]
    fn unknown_player_keeps_everything() {
        let c = resolve(&[], None);
        assert!(c.is_relevant(&buff(EventKind::ApplyBuff, 7, Some(99))));
        assert!(c.is_pet_event(&LogEvent::new(0, EventKind::Damage, "Claw").with_source(45)));
    }
}
