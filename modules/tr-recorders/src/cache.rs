//! Latest-snapshot-per-recorder cache (spec.md §4.7). Enrichment against
//! the active-call tracker happens at write time so the enriched fields
//! land in the persisted row, not just the in-memory copy.

use std::collections::HashMap;
use std::sync::RwLock;
use tr_calls::ActiveCallTracker;
use tr_core::RecorderSnapshot;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Key {
    instance: String,
    recorder_id: String,
}

pub struct RecorderCache {
    latest: RwLock<HashMap<Key, RecorderSnapshot>>,
}

impl RecorderCache {
    pub fn new() -> Self {
        Self { latest: RwLock::new(HashMap::new()) }
    }

    /// Enriches `snapshot` in place against `tracker` (if the recorder's
    /// frequency matches an in-flight call, the snapshot gains that call's
    /// tgid and units) then updates the cache. Returns the enriched
    /// snapshot for the caller to persist.
    pub fn record(&self, system_id: Uuid, tracker: &ActiveCallTracker, mut snapshot: RecorderSnapshot) -> RecorderSnapshot {
        if let Some(freq_hz) = snapshot.freq_hz {
            if let Some((tgid, unit_ids)) = tracker.find_by_frequency(system_id, freq_hz) {
                snapshot.enriched_tgid = Some(tgid);
                snapshot.enriched_unit_id = unit_ids.first().copied();
            }
        }

        let key = Key { instance: snapshot.instance.clone(), recorder_id: snapshot.recorder_id.clone() };
        self.latest.write().expect("recorder cache lock poisoned").insert(key, snapshot.clone());
        snapshot
    }

    pub fn get(&self, instance: &str, recorder_id: &str) -> Option<RecorderSnapshot> {
        self.latest
            .read()
            .expect("recorder cache lock poisoned")
            .get(&Key { instance: instance.to_string(), recorder_id: recorder_id.to_string() })
            .cloned()
    }

    pub fn snapshot_all(&self) -> Vec<RecorderSnapshot> {
        self.latest.read().expect("recorder cache lock poisoned").values().cloned().collect()
    }
}

impl Default for RecorderCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tr_calls::ActiveCall;

    fn snapshot(instance: &str, recorder_id: &str, freq_hz: Option<i64>) -> RecorderSnapshot {
        RecorderSnapshot {
            id: Uuid::new_v4(),
            instance: instance.to_string(),
            recorder_id: recorder_id.to_string(),
            recorder_type: None,
            freq_hz,
            rec_state: None,
            enriched_tgid: None,
            enriched_unit_id: None,
            observed_at: chrono::Utc::now(),
            extra: serde_json::json!({}),
        }
    }

    #[test]
    fn enriches_snapshot_when_frequency_matches_an_active_call() {
        let tracker = ActiveCallTracker::new();
        let system_id = Uuid::new_v4();
        tracker.start(ActiveCall {
            call_id: Uuid::new_v4(),
            system_id,
            tgid: 100,
            site_id: None,
            start_time: chrono::Utc::now(),
            unit_ids: vec![42],
            emergency: false,
            freq_hz: Some(851_000_000),
        });

        let cache = RecorderCache::new();
        let enriched = cache.record(system_id, &tracker, snapshot("tr-1", "rec-1", Some(851_000_000)));
        assert_eq!(enriched.enriched_tgid, Some(100));
        assert_eq!(enriched.enriched_unit_id, Some(42));
    }

    #[test]
    fn no_match_leaves_enrichment_fields_unset() {
        let tracker = ActiveCallTracker::new();
        let cache = RecorderCache::new();
        let enriched = cache.record(Uuid::new_v4(), &tracker, snapshot("tr-1", "rec-1", Some(851_000_000)));
        assert_eq!(enriched.enriched_tgid, None);
    }

    #[test]
    fn latest_overwrites_previous_for_same_key() {
        let tracker = ActiveCallTracker::new();
        let cache = RecorderCache::new();
        cache.record(Uuid::new_v4(), &tracker, snapshot("tr-1", "rec-1", None));
        cache.record(Uuid::new_v4(), &tracker, snapshot("tr-1", "rec-1", Some(1)));
        assert_eq!(cache.snapshot_all().len(), 1);
        assert_eq!(cache.get("tr-1", "rec-1").unwrap().freq_hz, Some(1));
    }
}
