//! Per-source transmission records within a call (spec.md §3). Keyed
//! through `call_start_time`, the partition key of the parent `calls` row.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tr_core::CallTransmission;
use uuid::Uuid;

pub async fn insert(
    pool: &PgPool,
    call_id: Uuid,
    call_start_time: DateTime<Utc>,
    unit_id: Option<i64>,
    start_time: DateTime<Utc>,
) -> Result<CallTransmission, sqlx::Error> {
    sqlx::query_as::<_, CallTransmission>(
        "INSERT INTO call_transmissions (id, call_id, call_start_time, unit_id, start_time, extra) \
         VALUES (gen_random_uuid(), $1, $2, $3, $4, '{}'::jsonb) \
         RETURNING id, call_id, call_start_time, unit_id, start_time, stop_time, extra",
    )
    .bind(call_id)
    .bind(call_start_time)
    .bind(unit_id)
    .bind(start_time)
    .fetch_one(pool)
    .await
}

/// Whether `unit_id` already has an open transmission under this call.
/// Trunk-recorder repeats the `call` unit event roughly every few seconds for
/// as long as a unit keeps transmitting, so each repeat must extend the
/// existing transmission rather than open a new one.
pub async fn has_open_for_unit(pool: &PgPool, call_id: Uuid, call_start_time: DateTime<Utc>, unit_id: i64) -> Result<bool, sqlx::Error> {
    let exists: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM call_transmissions \
         WHERE call_id = $1 AND call_start_time = $2 AND unit_id = $3 AND stop_time IS NULL)",
    )
    .bind(call_id)
    .bind(call_start_time)
    .bind(unit_id)
    .fetch_one(pool)
    .await?;
    Ok(exists.0)
}

/// Closes every still-open transmission under a call at once, since
/// trunk-recorder's unit-event stream has no dedicated "transmission ended"
/// message — `call_end` is the only reliable close signal (spec.md §3).
pub async fn close_all_for_call(pool: &PgPool, call_id: Uuid, call_start_time: DateTime<Utc>, stop_time: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE call_transmissions SET stop_time = $3 \
         WHERE call_id = $1 AND call_start_time = $2 AND stop_time IS NULL",
    )
    .bind(call_id)
    .bind(call_start_time)
    .bind(stop_time)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn list_for_call(pool: &PgPool, call_id: Uuid, call_start_time: DateTime<Utc>) -> anyhow::Result<Vec<CallTransmission>> {
    let rows = sqlx::query_as::<_, CallTransmission>(
        "SELECT id, call_id, call_start_time, unit_id, start_time, stop_time, extra \
         FROM call_transmissions WHERE call_id = $1 AND call_start_time = $2 ORDER BY start_time",
    )
    .bind(call_id)
    .bind(call_start_time)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
