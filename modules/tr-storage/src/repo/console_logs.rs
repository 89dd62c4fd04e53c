use crate::copy::{copy_rows, escape_text, opt_str};
use sqlx::PgPool;
use tr_core::ConsoleLog;

const COPY_SQL: &str = "COPY console_logs (id, instance, level, message, observed_at, extra) FROM STDIN";

pub async fn insert_batch(pool: &PgPool, rows: &[ConsoleLog]) -> anyhow::Result<u64> {
    let lines: Vec<String> = rows
        .iter()
        .map(|r| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                r.id,
                opt_str(&r.instance),
                opt_str(&r.level),
                escape_text(&r.message),
                r.observed_at.to_rfc3339(),
                escape_text(&r.extra.to_string()),
            )
        })
        .collect();
    copy_rows(pool, COPY_SQL, &lines).await
}

/// `order_by` must come from a caller-side allowlist (spec.md §6).
pub async fn search(pool: &PgPool, query: &str, limit: i64, order_by: &str) -> anyhow::Result<Vec<ConsoleLog>> {
    let sql = format!(
        "SELECT id, instance, level, message, observed_at, extra \
         FROM console_logs WHERE to_tsvector('english', message) @@ plainto_tsquery('english', $1) \
         ORDER BY {order_by} LIMIT $2"
    );
    let rows = sqlx::query_as::<_, ConsoleLog>(&sql).bind(query).bind(limit).fetch_all(pool).await?;
    Ok(rows)
}
