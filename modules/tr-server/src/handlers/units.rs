use axum::extract::{Path, Query, State};
use axum::Json;
use tr_core::{AmbiguousCandidate, TrError, TrResult, Unit};
use tr_storage::repo::{systems, units};
use uuid::Uuid;

use crate::auth::ReadAuth;
use crate::handlers::{capped_limit, resolve_sort, ListQuery};
use crate::state::ServerState;

const UNIT_SORT_COLUMNS: &[(&str, &str)] = &[("unit_id", "unit_id ASC"), ("updated_at", "updated_at DESC")];
const UNIT_DEFAULT_SORT: &str = "unit_id ASC";

pub async fn list_for_system(
    State(state): State<ServerState>,
    _auth: ReadAuth,
    Path(system_id): Path<Uuid>,
    Query(q): Query<ListQuery>,
) -> TrResult<Json<Vec<Unit>>> {
    let limit = capped_limit(q.limit, state.file_config.server.max_page_size);
    let order_by = resolve_sort(q.sort.as_deref(), UNIT_SORT_COLUMNS, UNIT_DEFAULT_SORT);
    let rows = units::list_for_system(state.pool(), system_id, limit, order_by).await?;
    Ok(Json(rows))
}

pub async fn get_scoped(
    State(state): State<ServerState>,
    _auth: ReadAuth,
    Path((system_id, unit_id)): Path<(Uuid, i64)>,
) -> TrResult<Json<Unit>> {
    units::get(state.pool(), system_id, unit_id)
        .await?
        .map(Json)
        .ok_or_else(|| TrError::NotFound(format!("unit {unit_id} in system {system_id}")))
}

pub async fn get_unscoped(State(state): State<ServerState>, _auth: ReadAuth, Path(unit_id): Path<i64>) -> TrResult<Json<Unit>> {
    let mut matches = units::find_by_unit_id_across_systems(state.pool(), unit_id).await?;
    match matches.len() {
        0 => Err(TrError::NotFound(format!("unit {unit_id}"))),
        1 => Ok(Json(matches.remove(0))),
        _ => {
            let mut candidates = Vec::with_capacity(matches.len());
            for unit in &matches {
                let system = systems::get(state.pool(), unit.system_id).await?;
                candidates.push(AmbiguousCandidate {
                    system_id: unit.system_id,
                    system_name: system
                        .as_ref()
                        .and_then(|s| s.name.clone())
                        .unwrap_or_else(|| unit.system_id.to_string()),
                    sysid: system.and_then(|s| s.sysid),
                });
            }
            Err(TrError::Ambiguous {
                message: format!("unit {unit_id} exists in {} systems, specify one", candidates.len()),
                candidates,
            })
        }
    }
}
