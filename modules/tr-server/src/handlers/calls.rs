use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tr_core::{Call, CallFrequency, CallTransmission, TrError, TrResult};
use tr_storage::repo::{call_frequencies, call_transmissions, calls};
use uuid::Uuid;

use crate::auth::ReadAuth;
use crate::handlers::{capped_limit, resolve_sort};
use crate::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct ListCallsQuery {
    pub limit: Option<i64>,
    pub sort: Option<String>,
    /// One row per call group instead of every multi-site capture
    /// (spec.md §8 invariant 4).
    #[serde(default)]
    pub dedup: bool,
}

const CALL_SORT_COLUMNS: &[(&str, &str)] = &[("start_time", "start_time DESC"), ("start_time_asc", "start_time ASC")];
const CALL_DEFAULT_SORT: &str = "start_time DESC";

pub async fn list_for_system(
    State(state): State<ServerState>,
    _auth: ReadAuth,
    Path(system_id): Path<Uuid>,
    Query(q): Query<ListCallsQuery>,
) -> TrResult<Json<Vec<Call>>> {
    let limit = capped_limit(q.limit, state.file_config.server.max_page_size);
    let order_by = resolve_sort(q.sort.as_deref(), CALL_SORT_COLUMNS, CALL_DEFAULT_SORT);
    let rows = if q.dedup {
        calls::list_deduplicated(state.pool(), system_id, limit, order_by).await?
    } else {
        calls::list_for_system(state.pool(), system_id, limit, order_by).await?
    };
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct GetCallQuery {
    pub start_time: DateTime<Utc>,
}

/// Calls are looked up by their partition key `(call_id, start_time)` —
/// `start_time` is required since `call_id` alone can't address a
/// partitioned row (spec.md §9).
pub async fn get(
    State(state): State<ServerState>,
    _auth: ReadAuth,
    Path(call_id): Path<Uuid>,
    Query(q): Query<GetCallQuery>,
) -> TrResult<Json<Call>> {
    calls::get(state.pool(), call_id, q.start_time)
        .await?
        .map(Json)
        .ok_or_else(|| TrError::NotFound(format!("call {call_id}")))
}

pub async fn list_frequencies(
    State(state): State<ServerState>,
    _auth: ReadAuth,
    Path(call_id): Path<Uuid>,
    Query(q): Query<GetCallQuery>,
) -> TrResult<Json<Vec<CallFrequency>>> {
    let rows = call_frequencies::list_for_call(state.pool(), call_id, q.start_time).await?;
    Ok(Json(rows))
}

pub async fn list_transmissions(
    State(state): State<ServerState>,
    _auth: ReadAuth,
    Path(call_id): Path<Uuid>,
    Query(q): Query<GetCallQuery>,
) -> TrResult<Json<Vec<CallTransmission>>> {
    let rows = call_transmissions::list_for_call(state.pool(), call_id, q.start_time).await?;
    Ok(Json(rows))
}
