//! Unit upsert — same scope and provenance rules as talkgroups
//! (spec.md §3).

use sqlx::PgPool;
use tr_core::{TagProvenance, Unit};
use uuid::Uuid;

fn rank(p: TagProvenance) -> i16 {
    match p {
        TagProvenance::Stream => 0,
        TagProvenance::Csv => 1,
        TagProvenance::Manual => 2,
    }
}

pub async fn upsert(
    pool: &PgPool,
    system_id: Uuid,
    unit_id: i64,
    label: Option<&str>,
    provenance: TagProvenance,
) -> Result<Unit, sqlx::Error> {
    sqlx::query_as::<_, Unit>(
        "INSERT INTO units (system_id, unit_id, label, provenance, updated_at, extra) \
         VALUES ($1, $2, $3, $4, now(), '{}'::jsonb) \
         ON CONFLICT (system_id, unit_id) DO UPDATE SET \
            label = EXCLUDED.label, provenance = EXCLUDED.provenance, updated_at = now() \
         WHERE $5 >= CASE units.provenance WHEN 'manual' THEN 2 WHEN 'csv' THEN 1 ELSE 0 END \
         RETURNING system_id, unit_id, label, provenance, updated_at, extra",
    )
    .bind(system_id)
    .bind(unit_id)
    .bind(label)
    .bind(provenance)
    .bind(rank(provenance))
    .fetch_one(pool)
    .await
}

pub async fn get(pool: &PgPool, system_id: Uuid, unit_id: i64) -> anyhow::Result<Option<Unit>> {
    let row = sqlx::query_as::<_, Unit>(
        "SELECT system_id, unit_id, label, provenance, updated_at, extra \
         FROM units WHERE system_id = $1 AND unit_id = $2",
    )
    .bind(system_id)
    .bind(unit_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// `order_by` must come from a caller-side allowlist (spec.md §6).
pub async fn list_for_system(pool: &PgPool, system_id: Uuid, limit: i64, order_by: &str) -> anyhow::Result<Vec<Unit>> {
    let sql = format!(
        "SELECT system_id, unit_id, label, provenance, updated_at, extra \
         FROM units WHERE system_id = $1 ORDER BY {order_by} LIMIT $2"
    );
    let rows = sqlx::query_as::<_, Unit>(&sql).bind(system_id).bind(limit).fetch_all(pool).await?;
    Ok(rows)
}

pub async fn find_by_unit_id_across_systems(pool: &PgPool, unit_id: i64) -> anyhow::Result<Vec<Unit>> {
    let rows = sqlx::query_as::<_, Unit>(
        "SELECT system_id, unit_id, label, provenance, updated_at, extra \
         FROM units WHERE unit_id = $1",
    )
    .bind(unit_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn merge_into(conn: &mut sqlx::PgConnection, from_system: Uuid, to_system: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO units (system_id, unit_id, label, provenance, updated_at, extra) \
         SELECT $2, unit_id, label, provenance, updated_at, extra FROM units WHERE system_id = $1 \
         ON CONFLICT (system_id, unit_id) DO UPDATE SET \
            label = EXCLUDED.label, provenance = EXCLUDED.provenance, updated_at = now() \
         WHERE CASE EXCLUDED.provenance WHEN 'manual' THEN 2 WHEN 'csv' THEN 1 ELSE 0 END \
             >= CASE units.provenance WHEN 'manual' THEN 2 WHEN 'csv' THEN 1 ELSE 0 END",
    )
    .bind(from_system)
    .bind(to_system)
    .execute(&mut *conn)
    .await?;
    sqlx::query("DELETE FROM units WHERE system_id = $1")
        .bind(from_system)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
