use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tr_core::{Site, TrResult};
use tr_storage::repo::sites;
use uuid::Uuid;

use crate::auth::ReadAuth;
use crate::handlers::resolve_sort;
use crate::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct SiteListQuery {
    pub sort: Option<String>,
}

const SITE_SORT_COLUMNS: &[(&str, &str)] = &[("short_name", "short_name ASC"), ("created_at", "created_at DESC")];
const SITE_DEFAULT_SORT: &str = "short_name ASC";

pub async fn list_for_system(
    State(state): State<ServerState>,
    _auth: ReadAuth,
    Path(system_id): Path<Uuid>,
    Query(q): Query<SiteListQuery>,
) -> TrResult<Json<Vec<Site>>> {
    let order_by = resolve_sort(q.sort.as_deref(), SITE_SORT_COLUMNS, SITE_DEFAULT_SORT);
    let rows = sites::list_for_system(state.pool(), system_id, order_by).await?;
    Ok(Json(rows))
}
