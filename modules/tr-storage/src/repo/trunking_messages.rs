use crate::copy::{copy_rows, escape_text, opt};
use sqlx::PgPool;
use tr_core::TrunkingMessage;
use uuid::Uuid;

const COPY_SQL: &str = "COPY trunking_messages (id, system_id, message, observed_at, extra) FROM STDIN";

pub async fn insert_batch(pool: &PgPool, rows: &[TrunkingMessage]) -> anyhow::Result<u64> {
    let lines: Vec<String> = rows
        .iter()
        .map(|r| {
            format!(
                "{}\t{}\t{}\t{}\t{}",
                r.id,
                opt(r.system_id),
                escape_text(&r.message),
                r.observed_at.to_rfc3339(),
                escape_text(&r.extra.to_string()),
            )
        })
        .collect();
    copy_rows(pool, COPY_SQL, &lines).await
}

/// `order_by` must come from a caller-side allowlist (spec.md §6).
pub async fn list_for_system(pool: &PgPool, system_id: Uuid, limit: i64, order_by: &str) -> anyhow::Result<Vec<TrunkingMessage>> {
    let sql = format!(
        "SELECT id, system_id, message, observed_at, extra \
         FROM trunking_messages WHERE system_id = $1 ORDER BY {order_by} LIMIT $2"
    );
    let rows = sqlx::query_as::<_, TrunkingMessage>(&sql).bind(system_id).bind(limit).fetch_all(pool).await?;
    Ok(rows)
}
