//! Recorder snapshots. The live set comes straight from the in-memory
//! cache (spec.md §4.5); history is served from storage for a specific
//! recorder once it falls out of cache.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tr_core::{RecorderSnapshot, TrResult};
use tr_storage::repo::recorder_snapshots;

use crate::auth::ReadAuth;
use crate::handlers::capped_limit;
use crate::state::ServerState;

pub async fn list_latest(State(state): State<ServerState>, _auth: ReadAuth) -> Json<Vec<RecorderSnapshot>> {
    Json(state.recorders.snapshot_all())
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

pub async fn history_for_instance(
    State(state): State<ServerState>,
    _auth: ReadAuth,
    Path(instance): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> TrResult<Json<Vec<RecorderSnapshot>>> {
    let limit = capped_limit(q.limit, state.file_config.server.max_page_size);
    let rows = recorder_snapshots::latest_per_recorder(state.pool(), limit).await?;
    let rows = rows.into_iter().filter(|r| r.instance == instance).collect();
    Ok(Json(rows))
}
