//! Crash-recovery checkpoints for `tr-calls`'s active-call tracker
//! (spec.md §4.4). Keyed on the same `(call_id, start_time)` composite as
//! `calls` since the checkpoint mirrors an in-flight call row.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tr_core::CallCheckpoint;
use uuid::Uuid;

pub async fn upsert(pool: &PgPool, checkpoint: &CallCheckpoint) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO call_checkpoints (call_id, system_id, tgid, start_time, site_id, checkpointed_at, state) \
         VALUES ($1, $2, $3, $4, $5, now(), $6) \
         ON CONFLICT (call_id, start_time) DO UPDATE SET \
            checkpointed_at = now(), state = EXCLUDED.state",
    )
    .bind(checkpoint.call_id)
    .bind(checkpoint.system_id)
    .bind(checkpoint.tgid)
    .bind(checkpoint.start_time)
    .bind(checkpoint.site_id)
    .bind(&checkpoint.state)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, call_id: Uuid, start_time: DateTime<Utc>) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM call_checkpoints WHERE call_id = $1 AND start_time = $2")
        .bind(call_id)
        .bind(start_time)
        .execute(pool)
        .await?;
    Ok(())
}

/// Loaded once at startup to repopulate the in-memory tracker (spec.md §6).
/// Checkpoints older than 7 days are treated as stale by the caller, not
/// filtered here — deletion of stale rows is a separate sweep.
pub async fn list_all(pool: &PgPool) -> Result<Vec<CallCheckpoint>, sqlx::Error> {
    sqlx::query_as::<_, CallCheckpoint>(
        "SELECT call_id, system_id, tgid, start_time, site_id, checkpointed_at, state \
         FROM call_checkpoints ORDER BY checkpointed_at DESC",
    )
    .fetch_all(pool)
    .await
}

pub async fn delete_older_than(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM call_checkpoints WHERE checkpointed_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
