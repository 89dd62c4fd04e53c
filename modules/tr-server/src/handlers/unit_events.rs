use axum::extract::{Path, Query, State};
use axum::Json;
use tr_core::{TrResult, UnitEvent};
use tr_storage::repo::unit_events;
use uuid::Uuid;

use crate::auth::ReadAuth;
use crate::handlers::{capped_limit, resolve_sort, ListQuery};
use crate::state::ServerState;

const UNIT_EVENT_SORT_COLUMNS: &[(&str, &str)] = &[("occurred_at", "occurred_at DESC"), ("occurred_at_asc", "occurred_at ASC")];
const UNIT_EVENT_DEFAULT_SORT: &str = "occurred_at DESC";

pub async fn list_for_unit(
    State(state): State<ServerState>,
    _auth: ReadAuth,
    Path((system_id, unit_id)): Path<(Uuid, i64)>,
    Query(q): Query<ListQuery>,
) -> TrResult<Json<Vec<UnitEvent>>> {
    let limit = capped_limit(q.limit, state.file_config.server.max_page_size);
    let order_by = resolve_sort(q.sort.as_deref(), UNIT_EVENT_SORT_COLUMNS, UNIT_EVENT_DEFAULT_SORT);
    let rows = unit_events::list_for_unit(state.pool(), system_id, unit_id, limit, order_by).await?;
    Ok(Json(rows))
}
