use axum::extract::{Path, Query, State};
use axum::Json;
use tr_core::{DecodeRate, TrResult};
use tr_storage::repo::decode_rates;

use crate::auth::ReadAuth;
use crate::handlers::{capped_limit, resolve_sort, ListQuery};
use crate::state::ServerState;

const DECODE_RATE_SORT_COLUMNS: &[(&str, &str)] = &[("observed_at", "observed_at DESC"), ("observed_at_asc", "observed_at ASC")];
const DECODE_RATE_DEFAULT_SORT: &str = "observed_at DESC";

pub async fn list_for_instance(
    State(state): State<ServerState>,
    _auth: ReadAuth,
    Path(instance): Path<String>,
    Query(q): Query<ListQuery>,
) -> TrResult<Json<Vec<DecodeRate>>> {
    let limit = capped_limit(q.limit, state.file_config.server.max_page_size);
    let order_by = resolve_sort(q.sort.as_deref(), DECODE_RATE_SORT_COLUMNS, DECODE_RATE_DEFAULT_SORT);
    let rows = decode_rates::list_for_instance(state.pool(), &instance, limit, order_by).await?;
    Ok(Json(rows))
}
