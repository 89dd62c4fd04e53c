//! Time-range partition helpers (spec.md §4.9, §6). Hot tables partition
//! monthly; the raw archive partitions weekly. `ensure_upcoming_partitions`
//! precreates the current window plus `windows_ahead` more, and is meant to
//! be called from a periodic maintenance task as well as at startup.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use sqlx::PgPool;
use tracing::info;

const MONTHLY_TABLES: &[&str] = &[
    "calls",
    "call_transmissions",
    "call_frequencies",
    "unit_events",
    "trunking_messages",
];
const WEEKLY_TABLES: &[&str] = &["raw_archive"];

pub async fn ensure_upcoming_partitions(pool: &PgPool, windows_ahead: i64) -> anyhow::Result<()> {
    let now = Utc::now();
    for table in MONTHLY_TABLES {
        for i in 0..=windows_ahead {
            let window_start = add_months(month_start(now), i);
            ensure_monthly_partition(pool, table, window_start).await?;
        }
    }
    for table in WEEKLY_TABLES {
        for i in 0..=windows_ahead {
            let window_start = week_start(now) + Duration::weeks(i);
            ensure_weekly_partition(pool, table, window_start).await?;
        }
    }
    Ok(())
}

async fn ensure_monthly_partition(pool: &PgPool, table: &str, window_start: DateTime<Utc>) -> anyhow::Result<()> {
    let window_end = month_start(window_start + Duration::days(32));
    let suffix = format!("y{:04}_m{:02}", window_start.year(), window_start.month());
    let partition_name = format!("{table}_{suffix}");
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {partition_name} PARTITION OF {table} \
         FOR VALUES FROM ('{start}') TO ('{end}')",
        start = window_start.to_rfc3339(),
        end = window_end.to_rfc3339(),
    );
    sqlx::raw_sql(&sql).execute(pool).await?;
    info!(partition = partition_name, "partition ensured");
    Ok(())
}

async fn ensure_weekly_partition(pool: &PgPool, table: &str, window_start: DateTime<Utc>) -> anyhow::Result<()> {
    let window_end = window_start + Duration::weeks(1);
    let iso = window_start.iso_week();
    let partition_name = format!("{table}_y{:04}_w{:02}", iso.year(), iso.week());
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {partition_name} PARTITION OF {table} \
         FOR VALUES FROM ('{start}') TO ('{end}')",
        start = window_start.to_rfc3339(),
        end = window_end.to_rfc3339(),
    );
    sqlx::raw_sql(&sql).execute(pool).await?;
    info!(partition = partition_name, "partition ensured");
    Ok(())
}

fn month_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_day(1)
        .and_then(|d| d.with_hour(0))
        .and_then(|d| d.with_minute(0))
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(ts)
}

fn week_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    let days_since_monday = ts.weekday().num_days_from_monday() as i64;
    (ts - Duration::days(days_since_monday))
        .with_hour(0)
        .and_then(|d| d.with_minute(0))
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Adds `n` calendar months to a value already normalized to a month start,
/// via year/month arithmetic rather than a flat day offset — months vary
/// from 28 to 31 days, so `Duration::days(31 * n)` drifts off the 1st.
fn add_months(month_start_ts: DateTime<Utc>, n: i64) -> DateTime<Utc> {
    let total_months = month_start_ts.year() as i64 * 12 + (month_start_ts.month() as i64 - 1) + n;
    let year = total_months.div_euclid(12) as i32;
    let month = (total_months.rem_euclid(12) + 1) as u32;
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single().expect("year/month arithmetic always yields a valid calendar date")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn month_start_normalizes_to_first_of_month_midnight() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 17, 14, 22, 5).unwrap();
        let start = month_start(ts);
        assert_eq!(start.day(), 1);
        assert_eq!(start.hour(), 0);
    }

    #[test]
    fn week_start_lands_on_monday() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 19, 10, 0, 0).unwrap(); // Thursday
        let start = week_start(ts);
        assert_eq!(start.weekday(), chrono::Weekday::Mon);
    }

    #[test]
    fn add_months_stays_on_the_first_across_a_short_month() {
        let april = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        let may = add_months(april, 1);
        assert_eq!((may.year(), may.month(), may.day()), (2026, 5, 1));
    }

    #[test]
    fn add_months_rolls_over_the_year_boundary() {
        let november = Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap();
        let next_year = add_months(november, 2);
        assert_eq!((next_year.year(), next_year.month(), next_year.day()), (2027, 1, 1));
    }
}
