use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use tr_core::{ConsoleLog, TrResult};
use tr_storage::repo::console_logs;

use crate::auth::ReadAuth;
use crate::handlers::{capped_limit, resolve_sort};
use crate::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<i64>,
    pub sort: Option<String>,
}

const CONSOLE_LOG_SORT_COLUMNS: &[(&str, &str)] = &[("observed_at", "observed_at DESC"), ("observed_at_asc", "observed_at ASC")];
const CONSOLE_LOG_DEFAULT_SORT: &str = "observed_at DESC";

pub async fn search(State(state): State<ServerState>, _auth: ReadAuth, Query(q): Query<SearchQuery>) -> TrResult<Json<Vec<ConsoleLog>>> {
    let limit = capped_limit(q.limit, state.file_config.server.max_page_size);
    let order_by = resolve_sort(q.sort.as_deref(), CONSOLE_LOG_SORT_COLUMNS, CONSOLE_LOG_DEFAULT_SORT);
    let rows = console_logs::search(state.pool(), &q.q, limit, order_by).await?;
    Ok(Json(rows))
}
