//! Live affiliation snapshots (spec.md §4.6) — served straight from the
//! in-memory map, no storage round trip, since affiliations are never
//! persisted.

use axum::extract::{Path, State};
use axum::Json;
use tr_core::Affiliation;
use uuid::Uuid;

use crate::auth::ReadAuth;
use crate::state::ServerState;

pub async fn list_for_system(State(state): State<ServerState>, _auth: ReadAuth, Path(system_id): Path<Uuid>) -> Json<Vec<Affiliation>> {
    Json(state.affiliation.snapshot_for_system(system_id))
}
