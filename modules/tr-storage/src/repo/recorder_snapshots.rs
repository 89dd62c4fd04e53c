use crate::copy::{copy_rows, escape_text, opt, opt_str};
use sqlx::PgPool;
use tr_core::RecorderSnapshot;

const COPY_SQL: &str = "COPY recorder_snapshots \
    (id, instance, recorder_id, recorder_type, freq_hz, rec_state, enriched_tgid, enriched_unit_id, observed_at, extra) \
    FROM STDIN";

pub async fn insert_batch(pool: &PgPool, rows: &[RecorderSnapshot]) -> anyhow::Result<u64> {
    let lines: Vec<String> = rows
        .iter()
        .map(|r| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                r.id,
                escape_text(&r.instance),
                escape_text(&r.recorder_id),
                opt_str(&r.recorder_type),
                opt(r.freq_hz),
                opt_str(&r.rec_state),
                opt(r.enriched_tgid),
                opt(r.enriched_unit_id),
                r.observed_at.to_rfc3339(),
                escape_text(&r.extra.to_string()),
            )
        })
        .collect();
    copy_rows(pool, COPY_SQL, &lines).await
}

pub async fn latest_for_recorder(pool: &PgPool, instance: &str, recorder_id: &str) -> anyhow::Result<Option<RecorderSnapshot>> {
    let row = sqlx::query_as::<_, RecorderSnapshot>(
        "SELECT id, instance, recorder_id, recorder_type, freq_hz, rec_state, enriched_tgid, enriched_unit_id, observed_at, extra \
         FROM recorder_snapshots WHERE instance = $1 AND recorder_id = $2 \
         ORDER BY observed_at DESC LIMIT 1",
    )
    .bind(instance)
    .bind(recorder_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn latest_per_recorder(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<RecorderSnapshot>> {
    let rows = sqlx::query_as::<_, RecorderSnapshot>(
        "SELECT DISTINCT ON (instance, recorder_id) \
                id, instance, recorder_id, recorder_type, freq_hz, rec_state, enriched_tgid, enriched_unit_id, observed_at, extra \
         FROM recorder_snapshots ORDER BY instance, recorder_id, observed_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
