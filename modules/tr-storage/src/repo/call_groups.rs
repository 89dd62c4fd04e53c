//! Dedup bundle persistence (spec.md §4.4, §8 invariant 4). The bucket key
//! `(system_id, tgid, start_time_bucket)` groups captures of the same
//! traffic; `primary_call_id`/`primary_call_start_time` are a soft
//! reference into the partitioned `calls` table (spec.md §9).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tr_core::CallGroup;
use uuid::Uuid;

pub async fn find_or_create(
    pool: &PgPool,
    system_id: Uuid,
    tgid: i64,
    start_time_bucket: DateTime<Utc>,
) -> Result<CallGroup, sqlx::Error> {
    sqlx::query_as::<_, CallGroup>(
        "INSERT INTO call_groups (system_id, tgid, start_time_bucket) VALUES ($1, $2, $3) \
         ON CONFLICT (system_id, tgid, start_time_bucket) DO UPDATE SET system_id = EXCLUDED.system_id \
         RETURNING call_group_id, system_id, tgid, start_time_bucket, primary_call_id, primary_call_start_time, created_at",
    )
    .bind(system_id)
    .bind(tgid)
    .bind(start_time_bucket)
    .fetch_one(pool)
    .await
}

pub async fn set_primary(
    pool: &PgPool,
    call_group_id: Uuid,
    primary_call_id: Uuid,
    primary_call_start_time: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE call_groups SET primary_call_id = $2, primary_call_start_time = $3 WHERE call_group_id = $1",
    )
    .bind(call_group_id)
    .bind(primary_call_id)
    .bind(primary_call_start_time)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &PgPool, call_group_id: Uuid) -> anyhow::Result<Option<CallGroup>> {
    let row = sqlx::query_as::<_, CallGroup>(
        "SELECT call_group_id, system_id, tgid, start_time_bucket, primary_call_id, primary_call_start_time, created_at \
         FROM call_groups WHERE call_group_id = $1",
    )
    .bind(call_group_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// `order_by` must come from a caller-side allowlist (spec.md §6).
pub async fn list_for_system(pool: &PgPool, system_id: Uuid, limit: i64, order_by: &str) -> anyhow::Result<Vec<CallGroup>> {
    let sql = format!(
        "SELECT call_group_id, system_id, tgid, start_time_bucket, primary_call_id, primary_call_start_time, created_at \
         FROM call_groups WHERE system_id = $1 ORDER BY {order_by} LIMIT $2"
    );
    let rows = sqlx::query_as::<_, CallGroup>(&sql).bind(system_id).bind(limit).fetch_all(pool).await?;
    Ok(rows)
}
