//! In-memory active-call tracker (spec.md §4.4). Sharded by `system_id` so
//! unrelated systems never contend on the same lock; all fuzzy-match
//! traversal happens while the shard's mutex is held, never storage I/O.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

const SHARD_COUNT: usize = 16;
const FUZZY_WINDOW: Duration = Duration::seconds(5);

#[derive(Debug, Clone)]
pub struct ActiveCall {
    pub call_id: Uuid,
    pub system_id: Uuid,
    pub tgid: i64,
    pub site_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub unit_ids: Vec<i64>,
    pub emergency: bool,
    /// Set once a frequency record arrives; used by the recorder cache to
    /// enrich snapshots (spec.md §4.7).
    pub freq_hz: Option<i64>,
}

pub struct ActiveCallTracker {
    shards: Vec<Mutex<HashMap<Uuid, ActiveCall>>>,
}

impl ActiveCallTracker {
    pub fn new() -> Self {
        Self { shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect() }
    }

    fn shard_for(&self, system_id: Uuid) -> &Mutex<HashMap<Uuid, ActiveCall>> {
        let bytes = system_id.as_bytes();
        let index = bytes.iter().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(*b as usize));
        &self.shards[index % self.shards.len()]
    }

    pub fn start(&self, call: ActiveCall) {
        let shard = self.shard_for(call.system_id);
        shard.lock().expect("active-call shard lock poisoned").insert(call.call_id, call);
    }

    pub fn update_frequency(&self, system_id: Uuid, call_id: Uuid, freq_hz: i64) {
        let mut shard = self.shard_for(system_id).lock().expect("active-call shard lock poisoned");
        if let Some(call) = shard.get_mut(&call_id) {
            call.freq_hz = Some(freq_hz);
        }
    }

    /// Exact-then-fuzzy close (spec.md §4.4, §8 invariant 3). An exact
    /// `call_id` match always wins; otherwise the most recent candidate
    /// with the same `tgid` and a start time within ±5 s is closed.
    pub fn end(&self, system_id: Uuid, call_id: Uuid, tgid: i64, end_start_time: DateTime<Utc>) -> Option<ActiveCall> {
        let mut shard = self.shard_for(system_id).lock().expect("active-call shard lock poisoned");
        if let Some(call) = shard.remove(&call_id) {
            return Some(call);
        }

        let fuzzy_match = shard
            .iter()
            .filter(|(_, c)| {
                c.system_id == system_id
                    && c.tgid == tgid
                    && (c.start_time - end_start_time).abs() <= FUZZY_WINDOW
            })
            .max_by_key(|(_, c)| c.start_time)
            .map(|(id, _)| *id);

        fuzzy_match.and_then(|id| shard.remove(&id))
    }

    /// Active call whose current frequency matches, for recorder-snapshot
    /// enrichment (spec.md §4.7). Returns `(tgid, unit_ids)`.
    pub fn find_by_frequency(&self, system_id: Uuid, freq_hz: i64) -> Option<(i64, Vec<i64>)> {
        let shard = self.shard_for(system_id).lock().expect("active-call shard lock poisoned");
        shard
            .values()
            .find(|c| c.system_id == system_id && c.freq_hz == Some(freq_hz))
            .map(|c| (c.tgid, c.unit_ids.clone()))
    }

    /// Non-removing lookup by `(system_id, tgid)`, for attaching per-source
    /// transmission records to the call they belong to (spec.md §3) without
    /// disturbing the tracker's lifecycle. Ties broken the same way as
    /// `end`'s fuzzy match: most recent start time wins.
    pub fn find_active(&self, system_id: Uuid, tgid: i64) -> Option<(Uuid, DateTime<Utc>)> {
        let shard = self.shard_for(system_id).lock().expect("active-call shard lock poisoned");
        shard
            .values()
            .filter(|c| c.system_id == system_id && c.tgid == tgid)
            .max_by_key(|c| c.start_time)
            .map(|c| (c.call_id, c.start_time))
    }

    /// Snapshot of every active call, for crash-recovery checkpointing on
    /// shutdown (spec.md §4.4).
    pub fn snapshot(&self) -> Vec<ActiveCall> {
        self.shards
            .iter()
            .flat_map(|shard| shard.lock().expect("active-call shard lock poisoned").values().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Repopulates the tracker from checkpoints loaded at startup.
    pub fn restore(&self, calls: Vec<ActiveCall>) {
        for call in calls {
            self.start(call);
        }
    }

    pub fn active_count(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().expect("active-call shard lock poisoned").len()).sum()
    }
}

impl Default for ActiveCallTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(system_id: Uuid, call_id: Uuid, tgid: i64, start_time: DateTime<Utc>) -> ActiveCall {
        ActiveCall { call_id, system_id, tgid, site_id: None, start_time, unit_ids: vec![], emergency: false, freq_hz: None }
    }

    #[test]
    fn exact_match_closes_the_right_call() {
        let tracker = ActiveCallTracker::new();
        let system_id = Uuid::new_v4();
        let call_id = Uuid::new_v4();
        let start = Utc::now();
        tracker.start(call(system_id, call_id, 100, start));
        let closed = tracker.end(system_id, call_id, 100, start);
        assert!(closed.is_some());
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn fuzzy_match_closes_call_within_drift_window() {
        let tracker = ActiveCallTracker::new();
        let system_id = Uuid::new_v4();
        let call_id = Uuid::new_v4();
        let start = Utc::now();
        tracker.start(call(system_id, call_id, 100, start));
        // call_end arrives with a different id and a drifted start time.
        let drifted_end_id = Uuid::new_v4();
        let closed = tracker.end(system_id, drifted_end_id, 100, start + Duration::seconds(2));
        assert!(closed.is_some());
        assert_eq!(closed.unwrap().call_id, call_id);
    }

    #[test]
    fn fuzzy_match_outside_window_does_not_close_unrelated_call() {
        let tracker = ActiveCallTracker::new();
        let system_id = Uuid::new_v4();
        let call_id = Uuid::new_v4();
        let start = Utc::now();
        tracker.start(call(system_id, call_id, 100, start));
        let miss_id = Uuid::new_v4();
        let closed = tracker.end(system_id, miss_id, 100, start + Duration::seconds(30));
        assert!(closed.is_none());
        assert_eq!(tracker.active_count(), 1);
    }

    #[test]
    fn find_active_locates_call_by_tgid_without_removing_it() {
        let tracker = ActiveCallTracker::new();
        let system_id = Uuid::new_v4();
        let call_id = Uuid::new_v4();
        let start = Utc::now();
        tracker.start(call(system_id, call_id, 100, start));
        let found = tracker.find_active(system_id, 100);
        assert_eq!(found, Some((call_id, start)));
        assert_eq!(tracker.active_count(), 1);
    }

    #[test]
    fn find_active_returns_none_for_unknown_tgid() {
        let tracker = ActiveCallTracker::new();
        assert_eq!(tracker.find_active(Uuid::new_v4(), 999), None);
    }

    #[test]
    fn fuzzy_match_prefers_most_recent_candidate() {
        let tracker = ActiveCallTracker::new();
        let system_id = Uuid::new_v4();
        let older = Uuid::new_v4();
        let newer = Uuid::new_v4();
        let base = Utc::now();
        tracker.start(call(system_id, older, 100, base));
        tracker.start(call(system_id, newer, 100, base + Duration::seconds(1)));
        let end_id = Uuid::new_v4();
        let closed = tracker.end(system_id, end_id, 100, base + Duration::seconds(1));
        assert_eq!(closed.unwrap().call_id, newer);
    }
}
