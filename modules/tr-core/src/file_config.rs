use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// TOML-backed structural configuration loaded from disk. Secrets and
/// connection strings stay in [`crate::AppConfig`] (env vars); every value
/// here has a built-in default, so a deployment can start with no file at
/// all by passing `FileConfig::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub ingest: IngestConfig,
    pub batch: BatchConfig,
    pub retention: RetentionConfig,
    pub raw_archive: RawArchiveConfig,
    pub rate_limit: RateLimitConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            ingest: IngestConfig::default(),
            batch: BatchConfig::default(),
            retention: RetentionConfig::default(),
            raw_archive: RawArchiveConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub allowed_origins: Vec<String>,
    pub read_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Hard cap on rows returned by any list endpoint, regardless of the
    /// caller's requested page size. spec.md §9 leaves the exact value as
    /// an open policy choice; 1000 is this deployment's answer.
    pub max_page_size: u32,
    pub merge_enabled: bool,
    /// Directory to watch for completed recordings as a secondary,
    /// broker-independent ingest path (spec.md §4.1, §6). Unset disables
    /// the watcher entirely.
    pub watch_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            allowed_origins: Vec::new(),
            read_timeout_secs: 30,
            idle_timeout_secs: 120,
            max_page_size: 1000,
            merge_enabled: true,
            watch_dir: None,
        }
    }
}

/// Parameters governing identity warmup, call fuzzy-matching, and
/// affiliation/recorder cache eviction — see spec.md §4.3, §4.4, §4.6.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub warmup_timeout_ms: u64,
    pub call_end_fuzzy_window_secs: i64,
    pub dedup_bucket_secs: i64,
    pub deaffiliation_coalesce_secs: i64,
    pub affiliation_eviction_hours: i64,
    pub affiliation_sweep_interval_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            warmup_timeout_ms: 5_000,
            call_end_fuzzy_window_secs: 5,
            dedup_bucket_secs: 2,
            deaffiliation_coalesce_secs: 6,
            affiliation_eviction_hours: 24,
            affiliation_sweep_interval_secs: 300,
        }
    }
}

/// Per-sink batcher tuning, shared by all high-volume batchers unless a
/// sink needs its own (see spec.md §4.5).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_batch_size: usize,
    pub max_linger_ms: u64,
    pub staging_capacity: usize,
    pub shutdown_drain_deadline_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 500,
            max_linger_ms: 250,
            staging_capacity: 10_000,
            shutdown_drain_deadline_secs: 10,
        }
    }
}

/// Decimation/retention schedule for append-only state tables (spec.md §3).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub full_fidelity_days: i64,
    pub per_minute_days: i64,
    pub checkpoint_retention_days: i64,
    pub maintenance_interval_secs: u64,
    pub partition_windows_ahead: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            full_fidelity_days: 7,
            per_minute_days: 30,
            checkpoint_retention_days: 7,
            maintenance_interval_secs: 3_600,
            partition_windows_ahead: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "mode", content = "handlers")]
pub enum RawArchiveMode {
    Disabled,
    Allowlist(Vec<String>),
    Denylist(Vec<String>),
}

impl Default for RawArchiveMode {
    fn default() -> Self {
        RawArchiveMode::Denylist(Vec::new())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawArchiveConfig {
    pub mode: RawArchiveMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_second: u64,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 50,
            burst_size: 100,
        }
    }
}

/// Load and parse a TOML config file, falling back to built-in defaults for
/// any field the file omits.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_with_empty_toml() {
        let config: FileConfig = toml::from_str("").expect("empty config uses all defaults");
        assert_eq!(config.server.max_page_size, 1000);
        assert_eq!(config.ingest.call_end_fuzzy_window_secs, 5);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let toml = r#"
            [ingest]
            call_end_fuzzy_window_secs = 10
        "#;
        let config: FileConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.ingest.call_end_fuzzy_window_secs, 10);
        assert_eq!(config.ingest.warmup_timeout_ms, 5_000);
    }

    #[test]
    fn raw_archive_allowlist_parses() {
        let toml = r#"
            [raw_archive]
            mode = "allowlist"
            handlers = ["call_start", "_unknown"]
        "#;
        let config: FileConfig = toml::from_str(toml).unwrap();
        assert_eq!(
            config.raw_archive.mode,
            RawArchiveMode::Allowlist(vec!["call_start".into(), "_unknown".into()])
        );
    }
}
