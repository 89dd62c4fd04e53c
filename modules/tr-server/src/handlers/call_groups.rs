//! Dedup bundle listing/detail (spec.md §6, §8 invariant 4) — the
//! deduplicated view is also reachable via `/calls?dedup=true`; this is the
//! group record itself, for clients that want the primary/member linkage.

use axum::extract::{Path, Query, State};
use axum::Json;
use tr_core::{CallGroup, TrError, TrResult};
use tr_storage::repo::call_groups;
use uuid::Uuid;

use crate::auth::ReadAuth;
use crate::handlers::{capped_limit, resolve_sort, ListQuery};
use crate::state::ServerState;

const CALL_GROUP_SORT_COLUMNS: &[(&str, &str)] = &[("start_time_bucket", "start_time_bucket DESC"), ("created_at", "created_at DESC")];
const CALL_GROUP_DEFAULT_SORT: &str = "start_time_bucket DESC";

pub async fn list_for_system(
    State(state): State<ServerState>,
    _auth: ReadAuth,
    Path(system_id): Path<Uuid>,
    Query(q): Query<ListQuery>,
) -> TrResult<Json<Vec<CallGroup>>> {
    let limit = capped_limit(q.limit, state.file_config.server.max_page_size);
    let order_by = resolve_sort(q.sort.as_deref(), CALL_GROUP_SORT_COLUMNS, CALL_GROUP_DEFAULT_SORT);
    let rows = call_groups::list_for_system(state.pool(), system_id, limit, order_by).await?;
    Ok(Json(rows))
}

pub async fn get(State(state): State<ServerState>, _auth: ReadAuth, Path(call_group_id): Path<Uuid>) -> TrResult<Json<CallGroup>> {
    call_groups::get(state.pool(), call_group_id)
        .await?
        .map(Json)
        .ok_or_else(|| TrError::NotFound(format!("call group {call_group_id}")))
}
