//! Age-based decimation for append-only state tables (spec.md §3: "full for
//! first week, 1/minute for first month, 1/hour thereafter"). Each pass
//! keeps the most recent row per bucket and deletes the rest; rows younger
//! than `full_fidelity_days` are never touched.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

struct DecimationTarget {
    table: &'static str,
    partition_cols: &'static str,
    time_col: &'static str,
}

const RECORDER_SNAPSHOTS: DecimationTarget = DecimationTarget {
    table: "recorder_snapshots",
    partition_cols: "instance, recorder_id",
    time_col: "observed_at",
};
const DECODE_RATES: DecimationTarget = DecimationTarget {
    table: "decode_rates",
    partition_cols: "instance",
    time_col: "observed_at",
};
const CONSOLE_LOGS: DecimationTarget = DecimationTarget {
    table: "console_logs",
    partition_cols: "coalesce(instance, '')",
    time_col: "observed_at",
};
const TRUNKING_MESSAGES: DecimationTarget = DecimationTarget {
    table: "trunking_messages",
    partition_cols: "coalesce(system_id::text, '')",
    time_col: "observed_at",
};

async fn decimate_to_bucket(pool: &PgPool, target: &DecimationTarget, bucket: &str, older_than: DateTime<Utc>, newer_than: Option<DateTime<Utc>>) -> anyhow::Result<u64> {
    let lower_bound = match newer_than {
        Some(_) => format!("AND {} >= $2", target.time_col),
        None => String::new(),
    };
    let sql = format!(
        "WITH ranked AS (
            SELECT id, row_number() OVER (
                PARTITION BY {partition_cols}, date_trunc('{bucket}', {time_col})
                ORDER BY {time_col} DESC
            ) AS rn
            FROM {table}
            WHERE {time_col} < $1 {lower_bound}
         )
         DELETE FROM {table} WHERE id IN (SELECT id FROM ranked WHERE rn > 1)",
        partition_cols = target.partition_cols,
        time_col = target.time_col,
        table = target.table,
        bucket = bucket,
        lower_bound = lower_bound,
    );

    let mut query = sqlx::query(&sql).bind(older_than);
    if let Some(newer_than) = newer_than {
        query = query.bind(newer_than);
    }
    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// Runs one decimation pass for a single table: rows between
/// `full_fidelity_days` and `per_minute_days` old are thinned to one row
/// per minute per partition key; rows older than `per_minute_days` are
/// thinned further to one row per hour.
async fn decimate_target(pool: &PgPool, target: &DecimationTarget, full_fidelity_days: i64, per_minute_days: i64) -> anyhow::Result<u64> {
    let now = Utc::now();
    let full_fidelity_cutoff = now - chrono::Duration::days(full_fidelity_days);
    let per_minute_cutoff = now - chrono::Duration::days(per_minute_days);

    let minute_deleted = decimate_to_bucket(pool, target, "minute", full_fidelity_cutoff, Some(per_minute_cutoff)).await?;
    let hour_deleted = decimate_to_bucket(pool, target, "hour", per_minute_cutoff, None).await?;
    Ok(minute_deleted + hour_deleted)
}

#[derive(Debug, Default)]
pub struct DecimationReport {
    pub recorder_snapshots: u64,
    pub decode_rates: u64,
    pub console_logs: u64,
    pub trunking_messages: u64,
}

pub async fn run(pool: &PgPool, full_fidelity_days: i64, per_minute_days: i64) -> anyhow::Result<DecimationReport> {
    Ok(DecimationReport {
        recorder_snapshots: decimate_target(pool, &RECORDER_SNAPSHOTS, full_fidelity_days, per_minute_days).await?,
        decode_rates: decimate_target(pool, &DECODE_RATES, full_fidelity_days, per_minute_days).await?,
        console_logs: decimate_target(pool, &CONSOLE_LOGS, full_fidelity_days, per_minute_days).await?,
        trunking_messages: decimate_target(pool, &TRUNKING_MESSAGES, full_fidelity_days, per_minute_days).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimation_targets_never_touch_hot_time_partitioned_tables() {
        let tables = [RECORDER_SNAPSHOTS.table, DECODE_RATES.table, CONSOLE_LOGS.table, TRUNKING_MESSAGES.table];
        assert!(!tables.contains(&"calls"));
        assert!(!tables.contains(&"call_transmissions"));
        assert!(!tables.contains(&"unit_events"));
    }
}
