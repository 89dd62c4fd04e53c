//! REST handlers for the `/api/v1` surface (spec.md §6). Each module
//! mirrors the `tr-storage::repo` module it reads from.

pub mod affiliations;
pub mod call_groups;
pub mod calls;
pub mod console_logs;
pub mod decode_rates;
pub mod recorders;
pub mod sites;
pub mod stats;
pub mod systems;
pub mod talkgroups;
pub mod trunking_messages;
pub mod unit_events;
pub mod units;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub sort: Option<String>,
}

/// Every list endpoint caps at `max_page_size` regardless of what the
/// caller requests (spec.md §9's unresolved page-size policy, settled in
/// DESIGN.md).
pub fn capped_limit(requested: Option<i64>, max_page_size: u32) -> i64 {
    let max = max_page_size as i64;
    requested.filter(|&n| n > 0).map(|n| n.min(max)).unwrap_or(max)
}

/// Resolves a caller-supplied `sort` key against a fixed per-resource
/// allowlist, falling back to `default` when the key is missing or unknown
/// (spec.md §6). The request value is only ever used as a lookup key here —
/// it is never interpolated into SQL itself, only the matched allowlist
/// entry is, so an unrecognized or hostile `sort` value can't reach a query.
pub fn resolve_sort(requested: Option<&str>, allowlist: &[(&str, &'static str)], default: &'static str) -> &'static str {
    requested.and_then(|key| allowlist.iter().find(|(name, _)| *name == key)).map(|(_, clause)| *clause).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_limit_defaults_to_max_page_size() {
        assert_eq!(capped_limit(None, 1000), 1000);
    }

    #[test]
    fn requested_limit_above_max_is_capped() {
        assert_eq!(capped_limit(Some(5000), 1000), 1000);
    }

    #[test]
    fn nonpositive_requested_limit_falls_back_to_max() {
        assert_eq!(capped_limit(Some(0), 1000), 1000);
        assert_eq!(capped_limit(Some(-5), 1000), 1000);
    }

    const CALL_SORTS: &[(&str, &str)] = &[("start_time", "start_time DESC"), ("start_time_asc", "start_time ASC")];

    #[test]
    fn unknown_sort_key_falls_back_to_default() {
        assert_eq!(resolve_sort(Some("'; DROP TABLE calls; --"), CALL_SORTS, "start_time DESC"), "start_time DESC");
    }

    #[test]
    fn missing_sort_key_falls_back_to_default() {
        assert_eq!(resolve_sort(None, CALL_SORTS, "start_time DESC"), "start_time DESC");
    }

    #[test]
    fn known_sort_key_resolves_to_its_allowlisted_clause() {
        assert_eq!(resolve_sort(Some("start_time_asc"), CALL_SORTS, "start_time DESC"), "start_time ASC");
    }
}
