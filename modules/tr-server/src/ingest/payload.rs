//! Tolerant JSON payload decoding (spec.md §9: "decoders tolerant of
//! unknown fields"). Every accessor returns `Option` rather than failing
//! the whole message on a missing or mistyped field — a malformed frame
//! is handled one layer up, not here.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Parses `bytes` as JSON; non-JSON payloads (trunk-recorder's console
/// topic is often plain text) are wrapped rather than dropped, so they
/// still reach the raw archive and the rest of the pipeline sees a
/// consistent `Value`.
pub fn parse_payload(bytes: &[u8]) -> (Value, bool) {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => (value, true),
        Err(_) => (serde_json::json!({ "raw": String::from_utf8_lossy(bytes) }), false),
    }
}

pub fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(|x| x.as_str())
}

pub fn i64_field(v: &Value, key: &str) -> Option<i64> {
    v.get(key).and_then(|x| x.as_i64())
}

pub fn f64_field(v: &Value, key: &str) -> Option<f64> {
    v.get(key).and_then(|x| x.as_f64())
}

pub fn bool_field(v: &Value, key: &str) -> Option<bool> {
    v.get(key).and_then(|x| x.as_bool())
}

pub fn i64_array_field(v: &Value, key: &str) -> Vec<i64> {
    v.get(key)
        .and_then(|x| x.as_array())
        .map(|arr| arr.iter().filter_map(|e| e.as_i64()).collect())
        .unwrap_or_default()
}

/// Upstream epoch timestamps (whole or fractional seconds since the Unix
/// epoch); trunk-recorder emits these for `start`/`stop`/`time` fields.
pub fn epoch_field(v: &Value, key: &str) -> Option<DateTime<Utc>> {
    let secs = f64_field(v, key)?;
    Utc.timestamp_opt(secs.trunc() as i64, ((secs.fract()) * 1_000_000_000.0).round() as u32)
        .single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_wraps_as_raw_string() {
        let (value, ok) = parse_payload(b"not json at all");
        assert!(!ok);
        assert_eq!(value["raw"], "not json at all");
    }

    #[test]
    fn valid_json_parses_through() {
        let (value, ok) = parse_payload(br#"{"tgid": 100}"#);
        assert!(ok);
        assert_eq!(i64_field(&value, "tgid"), Some(100));
    }

    #[test]
    fn epoch_field_recovers_fractional_seconds() {
        let value = serde_json::json!({"start": 1000.5});
        let parsed = epoch_field(&value, "start").unwrap();
        assert_eq!(parsed.timestamp(), 1000);
    }

    #[test]
    fn i64_array_field_skips_non_integer_entries() {
        let value = serde_json::json!({"units": [42, "not a unit", 7]});
        assert_eq!(i64_array_field(&value, "units"), vec![42, 7]);
    }

    #[test]
    fn i64_array_field_defaults_to_empty_when_absent() {
        let value = serde_json::json!({});
        assert!(i64_array_field(&value, "units").is_empty());
    }
}
