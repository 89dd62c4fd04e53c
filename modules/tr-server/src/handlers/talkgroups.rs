//! Talkgroup lookup, including the plain-`tgid` ambiguity case (spec.md
//! §8 property 11 / scenario S6): a bare tgid with no system qualifier
//! that matches more than one system returns 409 with candidates instead
//! of silently picking one.

use axum::extract::{Path, Query, State};
use axum::Json;
use tr_core::{AmbiguousCandidate, Talkgroup, TrError, TrResult};
use tr_storage::repo::{systems, talkgroups};
use uuid::Uuid;

use crate::auth::ReadAuth;
use crate::handlers::{capped_limit, resolve_sort, ListQuery};
use crate::state::ServerState;

const TALKGROUP_SORT_COLUMNS: &[(&str, &str)] = &[("tgid", "tgid ASC"), ("updated_at", "updated_at DESC")];
const TALKGROUP_DEFAULT_SORT: &str = "tgid ASC";

pub async fn list_for_system(
    State(state): State<ServerState>,
    _auth: ReadAuth,
    Path(system_id): Path<Uuid>,
    Query(q): Query<ListQuery>,
) -> TrResult<Json<Vec<Talkgroup>>> {
    let limit = capped_limit(q.limit, state.file_config.server.max_page_size);
    let order_by = resolve_sort(q.sort.as_deref(), TALKGROUP_SORT_COLUMNS, TALKGROUP_DEFAULT_SORT);
    let rows = talkgroups::list_for_system(state.pool(), system_id, limit, order_by).await?;
    Ok(Json(rows))
}

pub async fn get_scoped(
    State(state): State<ServerState>,
    _auth: ReadAuth,
    Path((system_id, tgid)): Path<(Uuid, i64)>,
) -> TrResult<Json<Talkgroup>> {
    talkgroups::get(state.pool(), system_id, tgid)
        .await?
        .map(Json)
        .ok_or_else(|| TrError::NotFound(format!("talkgroup {tgid} in system {system_id}")))
}

/// `GET /api/v1/talkgroups/:tgid` — unscoped lookup across every system.
pub async fn get_unscoped(State(state): State<ServerState>, _auth: ReadAuth, Path(tgid): Path<i64>) -> TrResult<Json<Talkgroup>> {
    let mut matches = talkgroups::find_by_tgid_across_systems(state.pool(), tgid).await?;
    match matches.len() {
        0 => Err(TrError::NotFound(format!("talkgroup {tgid}"))),
        1 => Ok(Json(matches.remove(0))),
        _ => {
            let mut candidates = Vec::with_capacity(matches.len());
            for tg in &matches {
                let system = systems::get(state.pool(), tg.system_id).await?;
                candidates.push(AmbiguousCandidate {
                    system_id: tg.system_id,
                    system_name: system
                        .as_ref()
                        .and_then(|s| s.name.clone())
                        .unwrap_or_else(|| tg.system_id.to_string()),
                    sysid: system.and_then(|s| s.sysid),
                });
            }
            Err(TrError::Ambiguous {
                message: format!("tgid {tgid} exists in {} systems, specify one", candidates.len()),
                candidates,
            })
        }
    }
}
