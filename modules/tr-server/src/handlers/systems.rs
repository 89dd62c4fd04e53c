use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tr_core::{System, TrError, TrResult};
use tr_storage::repo::systems;
use uuid::Uuid;

use crate::auth::{ReadAuth, WriteAuth};
use crate::handlers::{capped_limit, resolve_sort, ListQuery};
use crate::state::ServerState;

const SYSTEM_SORT_COLUMNS: &[(&str, &str)] = &[("created_at", "created_at DESC"), ("name", "name ASC")];
const SYSTEM_DEFAULT_SORT: &str = "created_at DESC";

pub async fn list(State(state): State<ServerState>, _auth: ReadAuth, Query(q): Query<ListQuery>) -> TrResult<Json<Vec<System>>> {
    let limit = capped_limit(q.limit, state.file_config.server.max_page_size);
    let order_by = resolve_sort(q.sort.as_deref(), SYSTEM_SORT_COLUMNS, SYSTEM_DEFAULT_SORT);
    let rows = systems::list_all(state.pool(), limit, order_by).await?;
    Ok(Json(rows))
}

pub async fn get(State(state): State<ServerState>, _auth: ReadAuth, Path(system_id): Path<Uuid>) -> TrResult<Json<System>> {
    systems::get(state.pool(), system_id)
        .await?
        .map(Json)
        .ok_or_else(|| TrError::NotFound(format!("system {system_id}")))
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub from: Uuid,
    pub into: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MergeResponse {
    pub merge_id: Uuid,
    pub sites_moved: u64,
    pub calls_moved: u64,
    pub unit_events_moved: u64,
}

/// Admin merge endpoint (spec.md §4.3, §6). Disabled outright if
/// `merge_enabled` is false in config, independent of the write token.
pub async fn merge(State(state): State<ServerState>, _auth: WriteAuth, Json(req): Json<MergeRequest>) -> TrResult<Json<MergeResponse>> {
    if !state.file_config.server.merge_enabled {
        return Err(TrError::Forbidden);
    }
    let outcome = tr_identity::merge_systems(state.pool(), &state.identity, req.from, req.into).await?;
    Ok(Json(MergeResponse {
        merge_id: outcome.merge_id,
        sites_moved: outcome.sites_moved,
        calls_moved: outcome.calls_moved,
        unit_events_moved: outcome.unit_events_moved,
    }))
}
