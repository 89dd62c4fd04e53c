//! Persists a stripped copy of inbound frames that could not be routed or
//! failed decoding, for later replay (spec.md §7). `strip_audio` enforces
//! invariant 10: a raw archive row for an audio topic never carries the
//! embedded audio blob, only its presence and size.

use crate::copy::{copy_rows, escape_text};
use sqlx::PgPool;
use tr_core::RawArchiveRow;

const COPY_SQL: &str = "COPY raw_archive (id, topic, handler, received_at, payload) FROM STDIN";

/// Audio topics carry a base64 `audioWavBase64`/`audio` field that would
/// otherwise dominate archive storage. Replace it with its byte length.
pub fn strip_audio(mut payload: serde_json::Value) -> serde_json::Value {
    if let Some(obj) = payload.as_object_mut() {
        for key in ["audioWavBase64", "audio", "audio_wav_base64"] {
            if let Some(value) = obj.get(key).and_then(|v| v.as_str()) {
                let len = value.len();
                obj.insert(key.to_string(), serde_json::json!({ "stripped_bytes": len }));
            }
        }
    }
    payload
}

pub async fn insert_batch(pool: &PgPool, rows: &[RawArchiveRow]) -> anyhow::Result<u64> {
    let lines: Vec<String> = rows
        .iter()
        .map(|r| {
            format!(
                "{}\t{}\t{}\t{}\t{}",
                r.id,
                escape_text(&r.topic),
                escape_text(&r.handler),
                r.received_at.to_rfc3339(),
                escape_text(&strip_audio(r.payload.clone()).to_string()),
            )
        })
        .collect();
    copy_rows(pool, COPY_SQL, &lines).await
}

pub async fn list_recent(pool: &PgPool, topic: &str, limit: i64) -> anyhow::Result<Vec<RawArchiveRow>> {
    let rows = sqlx::query_as::<_, RawArchiveRow>(
        "SELECT id, topic, handler, received_at, payload \
         FROM raw_archive WHERE topic = $1 ORDER BY received_at DESC LIMIT $2",
    )
    .bind(topic)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_audio_replaces_blob_with_length() {
        let payload = serde_json::json!({"audioWavBase64": "AAAA", "freq": 123});
        let stripped = strip_audio(payload);
        assert_eq!(stripped["audioWavBase64"]["stripped_bytes"], 4);
        assert_eq!(stripped["freq"], 123);
    }

    #[test]
    fn strip_audio_is_noop_without_audio_field() {
        let payload = serde_json::json!({"freq": 123});
        let stripped = strip_audio(payload.clone());
        assert_eq!(stripped, payload);
    }
}
