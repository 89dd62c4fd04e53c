//! System merge (spec.md §4.3, §8 invariant 2). Runs as a single
//! transaction so a failure anywhere rolls back the whole operation —
//! partial merges are never an acceptable outcome.

use crate::cache::IdentityCache;
use sqlx::PgPool;
use tr_core::{TrError, TrResult};
use tr_storage::repo::{calls, merge_audit, sites, systems, talkgroups, unit_events, units};
use uuid::Uuid;

pub struct MergeOutcome {
    pub merge_id: Uuid,
    pub sites_moved: u64,
    pub calls_moved: u64,
    pub unit_events_moved: u64,
}

/// Merge `from` into `to`: re-parent sites, talkgroups, units, calls, and
/// unit events, preserve higher-provenance tags on `to`, mark `from`
/// deleted, and record an audit row — all inside one transaction.
pub async fn merge_systems(pool: &PgPool, cache: &IdentityCache, from: Uuid, to: Uuid) -> TrResult<MergeOutcome> {
    if from == to {
        return Err(TrError::InvalidRequest("cannot merge a system into itself".to_string()));
    }
    if systems::get(pool, to).await?.is_none() {
        return Err(TrError::NotFound(format!("system {to}")));
    }
    if systems::get(pool, from).await?.is_none() {
        return Err(TrError::NotFound(format!("system {from}")));
    }

    let mut tx = pool.begin().await.map_err(|e| TrError::MergeFailed(e.to_string()))?;

    let sites_moved = sites::reparent_to(&mut *tx, from, to)
        .await
        .map_err(|e| TrError::MergeFailed(format!("reparenting sites: {e}")))?;
    talkgroups::merge_into(&mut *tx, from, to)
        .await
        .map_err(|e| TrError::MergeFailed(format!("merging talkgroups: {e}")))?;
    units::merge_into(&mut *tx, from, to)
        .await
        .map_err(|e| TrError::MergeFailed(format!("merging units: {e}")))?;
    let calls_moved = calls::reparent_to(&mut *tx, from, to)
        .await
        .map_err(|e| TrError::MergeFailed(format!("reparenting calls: {e}")))?;
    let unit_events_moved = unit_events::reparent_to(&mut *tx, from, to)
        .await
        .map_err(|e| TrError::MergeFailed(format!("reparenting unit events: {e}")))?;
    systems::mark_deleted(&mut *tx, from)
        .await
        .map_err(|e| TrError::MergeFailed(format!("marking source deleted: {e}")))?;

    let merged_tables = serde_json::json!({
        "sites": sites_moved,
        "calls": calls_moved,
        "unit_events": unit_events_moved,
    });
    let audit = merge_audit::insert(&mut *tx, from, to, merged_tables)
        .await
        .map_err(|e| TrError::MergeFailed(format!("writing merge audit: {e}")))?;

    tx.commit().await.map_err(|e| TrError::MergeFailed(e.to_string()))?;

    // Only invalidate after commit: a failed merge must leave the cache
    // resolving to the still-live source system.
    cache.invalidate_system(from);

    Ok(MergeOutcome { merge_id: audit.id, sites_moved, calls_moved, unit_events_moved })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_merging_a_system_into_itself() {
        let cache = IdentityCache::new();
        let id = Uuid::new_v4();
        // A real pool is required past this point; self-merge is rejected
        // before any query runs, so a disconnected pool is fine here.
        let pool = PgPool::connect_lazy("postgres://unused/unused").unwrap();
        let result = merge_systems(&pool, &cache, id, id).await;
        assert!(matches!(result, Err(TrError::InvalidRequest(_))));
    }
}
