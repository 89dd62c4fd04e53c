use sqlx::PgPool;
use tr_core::Site;
use uuid::Uuid;

pub async fn find_by_key(pool: &PgPool, system_id: Uuid, instance: &str, short_name: &str) -> anyhow::Result<Option<Site>> {
    let row = sqlx::query_as::<_, Site>(
        "SELECT site_id, system_id, instance, short_name, site_number, nac, created_at, extra \
         FROM sites WHERE system_id = $1 AND instance = $2 AND short_name = $3",
    )
    .bind(system_id)
    .bind(instance)
    .bind(short_name)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn insert(
    pool: &PgPool,
    system_id: Uuid,
    instance: &str,
    short_name: &str,
    site_number: Option<i64>,
    nac: Option<&str>,
) -> Result<Site, sqlx::Error> {
    sqlx::query_as::<_, Site>(
        "INSERT INTO sites (system_id, instance, short_name, site_number, nac, extra) \
         VALUES ($1, $2, $3, $4, $5, '{}'::jsonb) \
         RETURNING site_id, system_id, instance, short_name, site_number, nac, created_at, extra",
    )
    .bind(system_id)
    .bind(instance)
    .bind(short_name)
    .bind(site_number)
    .bind(nac)
    .fetch_one(pool)
    .await
}

/// `order_by` must come from a caller-side allowlist (spec.md §6).
pub async fn list_for_system(pool: &PgPool, system_id: Uuid, order_by: &str) -> anyhow::Result<Vec<Site>> {
    let sql = format!("SELECT site_id, system_id, instance, short_name, site_number, nac, created_at, extra FROM sites WHERE system_id = $1 ORDER BY {order_by}");
    let rows = sqlx::query_as::<_, Site>(&sql).bind(system_id).fetch_all(pool).await?;
    Ok(rows)
}

pub async fn reparent_to(executor: impl sqlx::PgExecutor<'_>, from_system: Uuid, to_system: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE sites SET system_id = $2 WHERE system_id = $1")
        .bind(from_system)
        .bind(to_system)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
