//! Shared helper for Postgres COPY-protocol bulk inserts (spec.md §6) —
//! the fast path `tr-batch`'s `Batcher<T>` flushes through for high-volume
//! sinks. Per-row inserts stay on plain `INSERT` for freshness (spec.md
//! §4.5); this module is only for the four batched sinks.

use sqlx::postgres::PgPoolCopyExt;
use sqlx::PgPool;

pub async fn copy_rows(pool: &PgPool, copy_sql: &str, rows: &[String]) -> anyhow::Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }
    let mut writer = pool.copy_in_raw(copy_sql).await?;
    let mut buf = String::new();
    for row in rows {
        buf.push_str(row);
        buf.push('\n');
    }
    writer.send(buf.into_bytes()).await?;
    let count = writer.finish().await?;
    Ok(count)
}

pub fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

pub fn opt<T: ToString>(value: Option<T>) -> String {
    match value {
        Some(v) => escape_text(&v.to_string()),
        None => "\\N".to_string(),
    }
}

pub fn opt_str(value: &Option<String>) -> String {
    match value {
        Some(v) => escape_text(v),
        None => "\\N".to_string(),
    }
}
