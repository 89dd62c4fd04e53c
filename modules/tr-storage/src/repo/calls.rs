//! Call lifecycle persistence (spec.md §4.4). `calls` is partitioned by
//! `start_time`, so every statement that touches an existing row must
//! carry `start_time` in its WHERE clause — the partition key can't be
//! looked up by `call_id` alone.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tr_core::Call;
use uuid::Uuid;

pub async fn insert(pool: &PgPool, call: &Call) -> Result<Call, sqlx::Error> {
    sqlx::query_as::<_, Call>(
        "INSERT INTO calls (call_id, system_id, tgid, site_id, start_time, call_group_id, is_primary, emergency, unit_ids, extra) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING call_id, system_id, tgid, site_id, start_time, stop_time, duration_secs, audio_file, \
                   call_group_id, is_primary, emergency, unit_ids, extra",
    )
    .bind(call.call_id)
    .bind(call.system_id)
    .bind(call.tgid)
    .bind(call.site_id)
    .bind(call.start_time)
    .bind(call.call_group_id)
    .bind(call.is_primary)
    .bind(call.emergency)
    .bind(&call.unit_ids)
    .bind(&call.extra)
    .fetch_one(pool)
    .await
}

pub async fn close(
    pool: &PgPool,
    call_id: Uuid,
    start_time: DateTime<Utc>,
    stop_time: DateTime<Utc>,
    audio_file: Option<&str>,
) -> anyhow::Result<Option<Call>> {
    let duration_secs = (stop_time - start_time).num_milliseconds() as f64 / 1000.0;
    let row = sqlx::query_as::<_, Call>(
        "UPDATE calls SET stop_time = $3, duration_secs = $4, audio_file = COALESCE($5, audio_file) \
         WHERE call_id = $1 AND start_time = $2 \
         RETURNING call_id, system_id, tgid, site_id, start_time, stop_time, duration_secs, audio_file, \
                   call_group_id, is_primary, emergency, unit_ids, extra",
    )
    .bind(call_id)
    .bind(start_time)
    .bind(stop_time)
    .bind(duration_secs)
    .bind(audio_file)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn get(pool: &PgPool, call_id: Uuid, start_time: DateTime<Utc>) -> anyhow::Result<Option<Call>> {
    let row = sqlx::query_as::<_, Call>(
        "SELECT call_id, system_id, tgid, site_id, start_time, stop_time, duration_secs, audio_file, \
                call_group_id, is_primary, emergency, unit_ids, extra \
         FROM calls WHERE call_id = $1 AND start_time = $2",
    )
    .bind(call_id)
    .bind(start_time)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// `order_by` must come from a caller-side allowlist (spec.md §6) — it is
/// interpolated directly into the query, never the raw request value.
pub async fn list_for_system(pool: &PgPool, system_id: Uuid, limit: i64, order_by: &str) -> anyhow::Result<Vec<Call>> {
    let sql = format!(
        "SELECT call_id, system_id, tgid, site_id, start_time, stop_time, duration_secs, audio_file, \
                call_group_id, is_primary, emergency, unit_ids, extra \
         FROM calls WHERE system_id = $1 ORDER BY {order_by} LIMIT $2"
    );
    let rows = sqlx::query_as::<_, Call>(&sql).bind(system_id).bind(limit).fetch_all(pool).await?;
    Ok(rows)
}

/// Deduplicated listing: one row per call group (spec.md §8 invariant 4).
pub async fn list_deduplicated(pool: &PgPool, system_id: Uuid, limit: i64, order_by: &str) -> anyhow::Result<Vec<Call>> {
    let sql = format!(
        "SELECT call_id, system_id, tgid, site_id, start_time, stop_time, duration_secs, audio_file, \
                call_group_id, is_primary, emergency, unit_ids, extra \
         FROM calls WHERE system_id = $1 AND (call_group_id IS NULL OR is_primary) \
         ORDER BY {order_by} LIMIT $2"
    );
    let rows = sqlx::query_as::<_, Call>(&sql).bind(system_id).bind(limit).fetch_all(pool).await?;
    Ok(rows)
}

pub async fn set_primary(pool: &PgPool, call_id: Uuid, start_time: DateTime<Utc>, is_primary: bool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE calls SET is_primary = $3 WHERE call_id = $1 AND start_time = $2")
        .bind(call_id)
        .bind(start_time)
        .bind(is_primary)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn reparent_to(executor: impl sqlx::PgExecutor<'_>, from_system: Uuid, to_system: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE calls SET system_id = $2 WHERE system_id = $1")
        .bind(from_system)
        .bind(to_system)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
