use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tr_core::{UnitEvent, UnitEventType};
use uuid::Uuid;

pub async fn insert(
    pool: &PgPool,
    system_id: Uuid,
    unit_id: i64,
    event_type: UnitEventType,
    tgid: Option<i64>,
    occurred_at: DateTime<Utc>,
) -> Result<UnitEvent, sqlx::Error> {
    sqlx::query_as::<_, UnitEvent>(
        "INSERT INTO unit_events (system_id, unit_id, event_type, tgid, occurred_at, extra) \
         VALUES ($1, $2, $3, $4, $5, '{}'::jsonb) \
         RETURNING id, system_id, unit_id, event_type, tgid, occurred_at, extra",
    )
    .bind(system_id)
    .bind(unit_id)
    .bind(event_type)
    .bind(tgid)
    .bind(occurred_at)
    .fetch_one(pool)
    .await
}

/// `order_by` must come from a caller-side allowlist (spec.md §6).
pub async fn list_for_unit(pool: &PgPool, system_id: Uuid, unit_id: i64, limit: i64, order_by: &str) -> anyhow::Result<Vec<UnitEvent>> {
    let sql = format!(
        "SELECT id, system_id, unit_id, event_type, tgid, occurred_at, extra \
         FROM unit_events WHERE system_id = $1 AND unit_id = $2 ORDER BY {order_by} LIMIT $3"
    );
    let rows = sqlx::query_as::<_, UnitEvent>(&sql).bind(system_id).bind(unit_id).bind(limit).fetch_all(pool).await?;
    Ok(rows)
}

pub async fn reparent_to(executor: impl sqlx::PgExecutor<'_>, from_system: Uuid, to_system: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE unit_events SET system_id = $2 WHERE system_id = $1")
        .bind(from_system)
        .bind(to_system)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
