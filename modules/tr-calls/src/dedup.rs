//! Call-group dedup (spec.md §4.4, §8 invariant 4). Captures of the same
//! radio traffic at multiple sites bucket into one call group keyed by
//! `(system_id, tgid, start_time_bucket)`; the best-quality capture by
//! average signal is marked primary.

use chrono::{DateTime, Duration, Timelike, Utc};
use sqlx::PgPool;
use tr_storage::repo::{call_frequencies, call_groups, calls};
use uuid::Uuid;

/// Truncates to the second. Spec.md doesn't pin an exact bucket width
/// (S3 groups captures within 500 ms); one-second truncation is wide
/// enough to catch multi-site jitter without merging distinct calls a
/// few seconds apart.
pub fn start_time_bucket(start_time: DateTime<Utc>) -> DateTime<Utc> {
    start_time.with_nanosecond(0).unwrap_or(start_time)
}

pub struct DedupOutcome {
    pub call_group_id: Uuid,
    pub is_primary: bool,
}

/// Assigns `call_id`/`call_start_time` to its dedup bucket and decides
/// whether it becomes (or stays) the group's primary capture, comparing
/// average signal strength against the current primary.
pub async fn assign(pool: &PgPool, system_id: Uuid, tgid: i64, call_id: Uuid, call_start_time: DateTime<Utc>) -> anyhow::Result<DedupOutcome> {
    let bucket = start_time_bucket(call_start_time);
    let group = call_groups::find_or_create(pool, system_id, tgid, bucket).await?;

    let candidate_signal = call_frequencies::average_signal(pool, call_id, call_start_time).await?;

    let is_primary = match (group.primary_call_id, group.primary_call_start_time) {
        (Some(primary_id), Some(primary_start)) if primary_id != call_id => {
            let primary_signal = call_frequencies::average_signal(pool, primary_id, primary_start).await?;
            let wins = match (candidate_signal, primary_signal) {
                (Some(c), Some(p)) => c > p,
                (Some(_), None) => true,
                _ => false,
            };
            if wins {
                calls::set_primary(pool, primary_id, primary_start, false).await?;
                call_groups::set_primary(pool, group.call_group_id, call_id, call_start_time).await?;
            }
            wins
        }
        _ => {
            call_groups::set_primary(pool, group.call_group_id, call_id, call_start_time).await?;
            true
        }
    };

    calls::set_primary(pool, call_id, call_start_time, is_primary).await?;
    Ok(DedupOutcome { call_group_id: group.call_group_id, is_primary })
}

/// Coalescing window for deaffiliation events that may trail `call_end`
/// by a few seconds (spec.md §4.4, upstream quirk 1).
pub const DEAFFILIATION_COALESCE_WINDOW: Duration = Duration::seconds(6);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_truncates_to_the_second() {
        let t = "2026-01-01T00:00:00.345Z".parse::<DateTime<Utc>>().unwrap();
        let bucketed = start_time_bucket(t);
        assert_eq!(bucketed.timestamp_subsec_nanos(), 0);
        assert_eq!(bucketed.timestamp(), t.timestamp());
    }

    #[test]
    fn captures_within_the_same_second_share_a_bucket() {
        let a = "2026-01-01T00:00:00.100Z".parse::<DateTime<Utc>>().unwrap();
        let b = "2026-01-01T00:00:00.600Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(start_time_bucket(a), start_time_bucket(b));
    }
}
