//! Operational snapshot (spec.md §6) — ingest counters plus the live sizes
//! of every in-memory component, for dashboards and health checks.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::auth::ReadAuth;
use crate::state::ServerState;
use crate::stats::IngestStatsSnapshot;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub ingest: IngestStatsSnapshot,
    pub active_calls: usize,
    pub affiliations_tracked: usize,
    pub event_subscribers: usize,
    pub warmup_released: bool,
}

pub async fn get(State(state): State<ServerState>, _auth: ReadAuth) -> Json<StatsResponse> {
    Json(StatsResponse {
        ingest: state.stats.snapshot(),
        active_calls: state.tracker.active_count(),
        affiliations_tracked: state.affiliation.len(),
        event_subscribers: state.bus.subscriber_count(),
        warmup_released: state.warmup.is_released(),
    })
}
