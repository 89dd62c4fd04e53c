//! System identity persistence (spec.md §3, §4.3). Upserts resolve
//! unique-constraint races by re-reading rather than failing — the caller
//! (tr-identity) treats a `23505` conflict as "someone else just inserted
//! this, go fetch it."

use sqlx::PgPool;
use tr_core::System;
use uuid::Uuid;

pub async fn find_by_trunked_key(pool: &PgPool, sysid: i64, wacn: &str) -> anyhow::Result<Option<System>> {
    let row = sqlx::query_as::<_, System>(
        "SELECT system_id, sysid, wacn, instance, name, system_type, created_at, extra \
         FROM systems WHERE sysid = $1 AND wacn = $2 AND deleted_at IS NULL",
    )
    .bind(sysid)
    .bind(wacn)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn find_by_conventional_key(pool: &PgPool, instance: &str, name: &str) -> anyhow::Result<Option<System>> {
    let row = sqlx::query_as::<_, System>(
        "SELECT system_id, sysid, wacn, instance, name, system_type, created_at, extra \
         FROM systems WHERE instance = $1 AND name = $2 AND sysid IS NULL AND deleted_at IS NULL",
    )
    .bind(instance)
    .bind(name)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn insert_trunked(pool: &PgPool, sysid: i64, wacn: &str) -> Result<System, sqlx::Error> {
    sqlx::query_as::<_, System>(
        "INSERT INTO systems (sysid, wacn, system_type, extra) VALUES ($1, $2, 'trunked', '{}'::jsonb) \
         RETURNING system_id, sysid, wacn, instance, name, system_type, created_at, extra",
    )
    .bind(sysid)
    .bind(wacn)
    .fetch_one(pool)
    .await
}

pub async fn insert_conventional(pool: &PgPool, instance: &str, name: &str) -> Result<System, sqlx::Error> {
    sqlx::query_as::<_, System>(
        "INSERT INTO systems (instance, name, system_type, extra) VALUES ($1, $2, 'conventional', '{}'::jsonb) \
         RETURNING system_id, sysid, wacn, instance, name, system_type, created_at, extra",
    )
    .bind(instance)
    .bind(name)
    .fetch_one(pool)
    .await
}

pub async fn get(pool: &PgPool, system_id: Uuid) -> anyhow::Result<Option<System>> {
    let row = sqlx::query_as::<_, System>(
        "SELECT system_id, sysid, wacn, instance, name, system_type, created_at, extra \
         FROM systems WHERE system_id = $1",
    )
    .bind(system_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// All live systems, newest first by default (spec.md §6 system listing).
/// `order_by` must come from a caller-side allowlist.
pub async fn list_all(pool: &PgPool, limit: i64, order_by: &str) -> anyhow::Result<Vec<System>> {
    let sql = format!(
        "SELECT system_id, sysid, wacn, instance, name, system_type, created_at, extra \
         FROM systems WHERE deleted_at IS NULL ORDER BY {order_by} LIMIT $1"
    );
    let rows = sqlx::query_as::<_, System>(&sql).bind(limit).fetch_all(pool).await?;
    Ok(rows)
}

pub async fn find_by_sysid_any_wacn(pool: &PgPool, sysid: i64) -> anyhow::Result<Vec<System>> {
    let rows = sqlx::query_as::<_, System>(
        "SELECT system_id, sysid, wacn, instance, name, system_type, created_at, extra \
         FROM systems WHERE sysid = $1 AND deleted_at IS NULL",
    )
    .bind(sysid)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn mark_deleted(executor: impl sqlx::PgExecutor<'_>, system_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE systems SET deleted_at = now() WHERE system_id = $1")
        .bind(system_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Is `error` a unique-constraint violation (Postgres code 23505)? The
/// identity resolver treats this as "lost the insert race, re-read."
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
