//! Domain types shared across the workspace. Every persisted row carries an
//! `extra` catch-all (`serde_json::Value`) for upstream fields the decoders
//! don't map explicitly — see spec.md §9 on tolerant decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Where a talkgroup/unit tag value came from. Higher variants win on
/// reimport: a manual edit is never overwritten by a later CSV or stream
/// upsert (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TagProvenance {
    Stream,
    Csv,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct System {
    pub system_id: Uuid,
    pub sysid: Option<i64>,
    pub wacn: Option<String>,
    pub instance: Option<String>,
    pub name: Option<String>,
    pub system_type: String,
    pub created_at: DateTime<Utc>,
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Site {
    pub site_id: Uuid,
    pub system_id: Uuid,
    pub instance: String,
    pub short_name: String,
    pub site_number: Option<i64>,
    pub nac: Option<String>,
    pub created_at: DateTime<Utc>,
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Talkgroup {
    pub system_id: Uuid,
    pub tgid: i64,
    pub alpha_tag: Option<String>,
    pub description: Option<String>,
    pub tag: Option<String>,
    pub group_name: Option<String>,
    pub provenance: TagProvenance,
    pub updated_at: DateTime<Utc>,
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Unit {
    pub system_id: Uuid,
    pub unit_id: i64,
    pub label: Option<String>,
    pub provenance: TagProvenance,
    pub updated_at: DateTime<Utc>,
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Call {
    pub call_id: Uuid,
    pub system_id: Uuid,
    pub tgid: i64,
    pub site_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub stop_time: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
    pub audio_file: Option<String>,
    pub call_group_id: Option<Uuid>,
    pub is_primary: bool,
    pub emergency: bool,
    /// Units observed transmitting on this call, for the GIN-indexed
    /// multi-unit filter (spec.md §6).
    pub unit_ids: Vec<i64>,
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CallTransmission {
    pub id: Uuid,
    pub call_id: Uuid,
    pub call_start_time: DateTime<Utc>,
    pub unit_id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub stop_time: Option<DateTime<Utc>>,
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CallFrequency {
    pub id: Uuid,
    pub call_id: Uuid,
    pub call_start_time: DateTime<Utc>,
    pub freq_hz: i64,
    pub signal: Option<f64>,
    pub noise: Option<f64>,
    pub observed_at: DateTime<Utc>,
    pub extra: serde_json::Value,
}

/// Dedup bundle for spec.md §4.4's "captures of the same traffic" grouping.
/// `primary_call_id`/`primary_call_start_time` together form a soft
/// reference into `calls` — see spec.md §9 on why this is not a hard FK.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CallGroup {
    pub call_group_id: Uuid,
    pub system_id: Uuid,
    pub tgid: i64,
    pub start_time_bucket: DateTime<Utc>,
    pub primary_call_id: Option<Uuid>,
    pub primary_call_start_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UnitEventType {
    On,
    Off,
    Call,
    End,
    Join,
    Location,
    Ackresp,
    Data,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UnitEvent {
    pub id: Uuid,
    pub system_id: Uuid,
    pub unit_id: i64,
    pub event_type: UnitEventType,
    pub tgid: Option<i64>,
    pub occurred_at: DateTime<Utc>,
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecorderSnapshot {
    pub id: Uuid,
    pub instance: String,
    pub recorder_id: String,
    pub recorder_type: Option<String>,
    pub freq_hz: Option<i64>,
    pub rec_state: Option<String>,
    /// Populated at write time if `freq_hz` matches an in-flight call
    /// (spec.md §4.7's enrichment step), not read back from storage.
    pub enriched_tgid: Option<i64>,
    pub enriched_unit_id: Option<i64>,
    pub observed_at: DateTime<Utc>,
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DecodeRate {
    pub id: Uuid,
    pub instance: String,
    pub decoderate: f64,
    pub control_channel: Option<i64>,
    pub observed_at: DateTime<Utc>,
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrunkingMessage {
    pub id: Uuid,
    pub system_id: Option<Uuid>,
    pub message: String,
    pub observed_at: DateTime<Utc>,
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConsoleLog {
    pub id: Uuid,
    pub instance: Option<String>,
    pub level: Option<String>,
    pub message: String,
    pub observed_at: DateTime<Utc>,
    pub extra: serde_json::Value,
}

/// Sensitive-blob-stripped copy of an inbound frame, retained for recovery
/// of unmapped or dropped-on-failure messages (spec.md §7).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RawArchiveRow {
    pub id: Uuid,
    pub topic: String,
    pub handler: String,
    pub received_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffiliationStatus {
    Affiliated,
    Off,
}

/// In-memory only — never persisted as a row (spec.md §3). `since` tracks
/// when the unit affiliated with the *current* tgid, distinct from
/// `last_event_time` which updates on every event including `off`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Affiliation {
    pub system_id: Uuid,
    pub unit_id: i64,
    pub tgid: Option<i64>,
    pub status: AffiliationStatus,
    pub last_event_time: DateTime<Utc>,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MergeAudit {
    pub id: Uuid,
    pub source_system_id: Uuid,
    pub target_system_id: Uuid,
    pub merged_at: DateTime<Utc>,
    pub merged_tables: serde_json::Value,
}

/// Crash-recovery checkpoint of one active-call-tracker entry, written on
/// shutdown and retained for ~7 days (spec.md §4.4, §6).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CallCheckpoint {
    pub call_id: Uuid,
    pub system_id: Uuid,
    pub tgid: i64,
    pub start_time: DateTime<Utc>,
    pub site_id: Option<Uuid>,
    pub checkpointed_at: DateTime<Utc>,
    pub state: serde_json::Value,
}
