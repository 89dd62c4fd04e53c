use crate::copy::{copy_rows, escape_text, opt};
use sqlx::PgPool;
use tr_core::DecodeRate;

const COPY_SQL: &str = "COPY decode_rates (id, instance, decoderate, control_channel, observed_at, extra) FROM STDIN";

pub async fn insert_batch(pool: &PgPool, rows: &[DecodeRate]) -> anyhow::Result<u64> {
    let lines: Vec<String> = rows
        .iter()
        .map(|r| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                r.id,
                escape_text(&r.instance),
                r.decoderate,
                opt(r.control_channel),
                r.observed_at.to_rfc3339(),
                escape_text(&r.extra.to_string()),
            )
        })
        .collect();
    copy_rows(pool, COPY_SQL, &lines).await
}

/// `order_by` must come from a caller-side allowlist (spec.md §6).
pub async fn list_for_instance(pool: &PgPool, instance: &str, limit: i64, order_by: &str) -> anyhow::Result<Vec<DecodeRate>> {
    let sql = format!(
        "SELECT id, instance, decoderate, control_channel, observed_at, extra \
         FROM decode_rates WHERE instance = $1 ORDER BY {order_by} LIMIT $2"
    );
    let rows = sqlx::query_as::<_, DecodeRate>(&sql).bind(instance).bind(limit).fetch_all(pool).await?;
    Ok(rows)
}
