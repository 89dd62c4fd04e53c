//! Ingest-side counters (spec.md §7: "increment a counter" for malformed
//! payloads, identity failures, fuzzy misses, slow-subscriber drops).
//! Process-lifetime only, surfaced read-only through `/api/v1/stats`.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct IngestStats {
    pub malformed_payloads: AtomicU64,
    pub identity_resolution_failures: AtomicU64,
    pub fuzzy_call_end_misses: AtomicU64,
    pub unknown_topic_frames: AtomicU64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            malformed_payloads: self.malformed_payloads.load(Ordering::Relaxed),
            identity_resolution_failures: self.identity_resolution_failures.load(Ordering::Relaxed),
            fuzzy_call_end_misses: self.fuzzy_call_end_misses.load(Ordering::Relaxed),
            unknown_topic_frames: self.unknown_topic_frames.load(Ordering::Relaxed),
        }
    }

    pub fn record_malformed_payload(&self) {
        self.malformed_payloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_identity_failure(&self) {
        self.identity_resolution_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fuzzy_miss(&self) {
        self.fuzzy_call_end_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_topic(&self) {
        self.unknown_topic_frames.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestStatsSnapshot {
    pub malformed_payloads: u64,
    pub identity_resolution_failures: u64,
    pub fuzzy_call_end_misses: u64,
    pub unknown_topic_frames: u64,
}
