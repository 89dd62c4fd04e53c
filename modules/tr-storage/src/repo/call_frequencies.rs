//! Per-frequency RF records within a call (spec.md §3), used by the dedup
//! primary-capture selection to compare signal quality across sites.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tr_core::CallFrequency;
use uuid::Uuid;

pub async fn insert(
    pool: &PgPool,
    call_id: Uuid,
    call_start_time: DateTime<Utc>,
    freq_hz: i64,
    signal: Option<f64>,
    noise: Option<f64>,
    observed_at: DateTime<Utc>,
) -> Result<CallFrequency, sqlx::Error> {
    sqlx::query_as::<_, CallFrequency>(
        "INSERT INTO call_frequencies (id, call_id, call_start_time, freq_hz, signal, noise, observed_at, extra) \
         VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, '{}'::jsonb) \
         RETURNING id, call_id, call_start_time, freq_hz, signal, noise, observed_at, extra",
    )
    .bind(call_id)
    .bind(call_start_time)
    .bind(freq_hz)
    .bind(signal)
    .bind(noise)
    .bind(observed_at)
    .fetch_one(pool)
    .await
}

pub async fn list_for_call(pool: &PgPool, call_id: Uuid, call_start_time: DateTime<Utc>) -> anyhow::Result<Vec<CallFrequency>> {
    let rows = sqlx::query_as::<_, CallFrequency>(
        "SELECT id, call_id, call_start_time, freq_hz, signal, noise, observed_at, extra \
         FROM call_frequencies WHERE call_id = $1 AND call_start_time = $2 ORDER BY observed_at",
    )
    .bind(call_id)
    .bind(call_start_time)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Average signal strength across a call's frequency records, the quality
/// metric the dedup primary-capture selection compares (spec.md §4.4).
pub async fn average_signal(pool: &PgPool, call_id: Uuid, call_start_time: DateTime<Utc>) -> anyhow::Result<Option<f64>> {
    let row: Option<(Option<f64>,)> = sqlx::query_as(
        "SELECT AVG(signal) FROM call_frequencies WHERE call_id = $1 AND call_start_time = $2 AND signal IS NOT NULL",
    )
    .bind(call_id)
    .bind(call_start_time)
    .fetch_optional(pool)
    .await?;
    Ok(row.and_then(|(avg,)| avg))
}
