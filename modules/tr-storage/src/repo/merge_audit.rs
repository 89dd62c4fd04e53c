use sqlx::PgPool;
use tr_core::MergeAudit;
use uuid::Uuid;

pub async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    source_system_id: Uuid,
    target_system_id: Uuid,
    merged_tables: serde_json::Value,
) -> Result<MergeAudit, sqlx::Error> {
    sqlx::query_as::<_, MergeAudit>(
        "INSERT INTO merge_audit (id, source_system_id, target_system_id, merged_at, merged_tables) \
         VALUES (gen_random_uuid(), $1, $2, now(), $3) \
         RETURNING id, source_system_id, target_system_id, merged_at, merged_tables",
    )
    .bind(source_system_id)
    .bind(target_system_id)
    .bind(merged_tables)
    .fetch_one(executor)
    .await
}

pub async fn list_for_system(pool: &PgPool, system_id: Uuid) -> Result<Vec<MergeAudit>, sqlx::Error> {
    sqlx::query_as::<_, MergeAudit>(
        "SELECT id, source_system_id, target_system_id, merged_at, merged_tables \
         FROM merge_audit WHERE source_system_id = $1 OR target_system_id = $1 \
         ORDER BY merged_at DESC",
    )
    .bind(system_id)
    .fetch_all(pool)
    .await
}
