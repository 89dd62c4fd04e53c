use axum::extract::{Path, Query, State};
use axum::Json;
use tr_core::{TrResult, TrunkingMessage};
use tr_storage::repo::trunking_messages;
use uuid::Uuid;

use crate::auth::ReadAuth;
use crate::handlers::{capped_limit, resolve_sort, ListQuery};
use crate::state::ServerState;

const TRUNKING_MESSAGE_SORT_COLUMNS: &[(&str, &str)] = &[("observed_at", "observed_at DESC"), ("observed_at_asc", "observed_at ASC")];
const TRUNKING_MESSAGE_DEFAULT_SORT: &str = "observed_at DESC";

pub async fn list_for_system(
    State(state): State<ServerState>,
    _auth: ReadAuth,
    Path(system_id): Path<Uuid>,
    Query(q): Query<ListQuery>,
) -> TrResult<Json<Vec<TrunkingMessage>>> {
    let limit = capped_limit(q.limit, state.file_config.server.max_page_size);
    let order_by = resolve_sort(q.sort.as_deref(), TRUNKING_MESSAGE_SORT_COLUMNS, TRUNKING_MESSAGE_DEFAULT_SORT);
    let rows = trunking_messages::list_for_system(state.pool(), system_id, limit, order_by).await?;
    Ok(Json(rows))
}
