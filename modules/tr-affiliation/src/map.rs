//! In-memory affiliation map (spec.md §4.6). Never persisted; a periodic
//! sweep evicts entries idle past 24 h.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tr_core::{Affiliation, AffiliationStatus};
use uuid::Uuid;

const EVICTION_AGE: Duration = Duration::hours(24);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    system_id: Uuid,
    unit_id: i64,
}

pub struct AffiliationMap {
    entries: RwLock<HashMap<Key, Affiliation>>,
}

impl AffiliationMap {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    /// Updated by unit-event handlers: `call`/`on`/`join` affiliate, `end`
    /// does not change the tgid (the unit may still be mid-call), `off`
    /// deaffiliates entirely.
    pub fn record_affiliated(&self, system_id: Uuid, unit_id: i64, tgid: i64, at: DateTime<Utc>) {
        let key = Key { system_id, unit_id };
        let mut entries = self.entries.write().expect("affiliation map lock poisoned");
        let since = match entries.get(&key) {
            Some(existing) if existing.tgid == Some(tgid) && existing.status == AffiliationStatus::Affiliated => existing.since,
            _ => at,
        };
        entries.insert(
            key,
            Affiliation { system_id, unit_id, tgid: Some(tgid), status: AffiliationStatus::Affiliated, last_event_time: at, since },
        );
    }

    pub fn record_off(&self, system_id: Uuid, unit_id: i64, at: DateTime<Utc>) {
        let key = Key { system_id, unit_id };
        self.entries.write().expect("affiliation map lock poisoned").insert(
            key,
            Affiliation { system_id, unit_id, tgid: None, status: AffiliationStatus::Off, last_event_time: at, since: at },
        );
    }

    /// Bumps `last_event_time` without changing affiliation state, for
    /// events (e.g. `end`, `ackresp`) that prove liveness but don't change
    /// the current tgid.
    pub fn touch(&self, system_id: Uuid, unit_id: i64, at: DateTime<Utc>) {
        let key = Key { system_id, unit_id };
        if let Some(entry) = self.entries.write().expect("affiliation map lock poisoned").get_mut(&key) {
            entry.last_event_time = at;
        }
    }

    pub fn get(&self, system_id: Uuid, unit_id: i64) -> Option<Affiliation> {
        self.entries.read().expect("affiliation map lock poisoned").get(&Key { system_id, unit_id }).cloned()
    }

    /// Read-only snapshot for the API layer (spec.md §4.6).
    pub fn snapshot_for_system(&self, system_id: Uuid) -> Vec<Affiliation> {
        self.entries
            .read()
            .expect("affiliation map lock poisoned")
            .values()
            .filter(|a| a.system_id == system_id)
            .cloned()
            .collect()
    }

    /// Evicts entries idle past 24 h (spec.md §8 invariant 9). Intended to
    /// be driven by a periodic `tokio::time::interval` sweep (~5 min).
    pub fn evict_stale(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().expect("affiliation map lock poisoned");
        let before = entries.len();
        entries.retain(|_, a| now - a.last_event_time <= EVICTION_AGE);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("affiliation map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AffiliationMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affiliating_then_reading_back_round_trips() {
        let map = AffiliationMap::new();
        let system_id = Uuid::new_v4();
        let now = Utc::now();
        map.record_affiliated(system_id, 42, 100, now);
        let a = map.get(system_id, 42).unwrap();
        assert_eq!(a.tgid, Some(100));
        assert_eq!(a.status, AffiliationStatus::Affiliated);
    }

    #[test]
    fn off_event_clears_tgid() {
        let map = AffiliationMap::new();
        let system_id = Uuid::new_v4();
        let now = Utc::now();
        map.record_affiliated(system_id, 42, 100, now);
        map.record_off(system_id, 42, now + Duration::seconds(1));
        let a = map.get(system_id, 42).unwrap();
        assert_eq!(a.tgid, None);
        assert_eq!(a.status, AffiliationStatus::Off);
    }

    #[test]
    fn eviction_removes_only_stale_entries() {
        let map = AffiliationMap::new();
        let system_id = Uuid::new_v4();
        let now = Utc::now();
        map.record_affiliated(system_id, 1, 100, now - Duration::hours(25));
        map.record_affiliated(system_id, 2, 100, now - Duration::hours(1));
        let evicted = map.evict_stale(now);
        assert_eq!(evicted, 1);
        assert!(map.get(system_id, 1).is_none());
        assert!(map.get(system_id, 2).is_some());
    }

    #[test]
    fn reaffiliating_to_the_same_tgid_preserves_since() {
        let map = AffiliationMap::new();
        let system_id = Uuid::new_v4();
        let t0 = Utc::now();
        map.record_affiliated(system_id, 42, 100, t0);
        map.record_affiliated(system_id, 42, 100, t0 + Duration::seconds(30));
        let a = map.get(system_id, 42).unwrap();
        assert_eq!(a.since, t0);
        assert_eq!(a.last_event_time, t0 + Duration::seconds(30));
    }
}
