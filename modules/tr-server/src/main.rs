mod auth;
mod handlers;
mod ingest;
mod query;
mod rate_limit;
mod routes;
mod sse;
mod state;
mod stats;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;
use tr_affiliation::AffiliationMap;
use tr_calls::{ActiveCall, ActiveCallTracker};
use tr_core::AppConfig;
use tr_events::EventBus;
use tr_identity::{IdentityCache, WarmupGate};
use tr_recorders::RecorderCache;
use tr_storage::repo::checkpoints;
use tr_transport::{Broker, InboundFrame, MqttBroker};

use ingest::IngestBatchers;
use state::ServerState;
use stats::IngestStats;

const EVENT_RING_CAPACITY: usize = 10_000;
const EVENT_RING_WINDOW: Duration = Duration::from_secs(60);
const EVENT_CHANNEL_CAPACITY: usize = 256;
const BROKER_CHANNEL_CAPACITY: usize = 4096;

#[derive(Parser)]
#[command(name = "tr-server", about = "trunk-recorder radio-monitoring ingest and API server")]
struct Cli {
    /// Path to the structural config TOML file.
    #[arg(long, default_value = "./config/tr-server.toml")]
    config: PathBuf,
}

fn active_call_from_checkpoint(checkpoint: tr_core::CallCheckpoint) -> ActiveCall {
    let unit_ids = checkpoint.state.get("unit_ids").and_then(|v| v.as_array()).map(|a| a.iter().filter_map(|v| v.as_i64()).collect()).unwrap_or_default();
    let emergency = checkpoint.state.get("emergency").and_then(|v| v.as_bool()).unwrap_or(false);
    let freq_hz = checkpoint.state.get("freq_hz").and_then(|v| v.as_i64());
    ActiveCall {
        call_id: checkpoint.call_id,
        system_id: checkpoint.system_id,
        tgid: checkpoint.tgid,
        site_id: checkpoint.site_id,
        start_time: checkpoint.start_time,
        unit_ids,
        emergency,
        freq_hz,
    }
}

/// Periodic housekeeping: partition precreation, checkpoint retention,
/// append-only table decimation, and sweeping stale affiliations (spec.md
/// §3, §4.6, §4.9, §5).
fn spawn_maintenance(state: ServerState, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
    let interval = Duration::from_secs(state.file_config.retention.maintenance_interval_secs);
    let sweep_interval = Duration::from_secs(state.file_config.ingest.affiliation_sweep_interval_secs);
    let windows_ahead = state.file_config.retention.partition_windows_ahead;
    let checkpoint_retention_days = state.file_config.retention.checkpoint_retention_days;
    let full_fidelity_days = state.file_config.retention.full_fidelity_days;
    let per_minute_days = state.file_config.retention.per_minute_days;

    tokio::spawn(async move {
        let mut maintenance_tick = tokio::time::interval(interval);
        let mut sweep_tick = tokio::time::interval(sweep_interval);
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = maintenance_tick.tick() => {
                    if let Err(error) = tr_storage::partition::ensure_upcoming_partitions(state.pool(), windows_ahead).await {
                        tracing::error!(%error, "failed to precreate upcoming partitions");
                    }
                    let cutoff = Utc::now() - chrono::Duration::days(checkpoint_retention_days);
                    match checkpoints::delete_older_than(state.pool(), cutoff).await {
                        Ok(deleted) if deleted > 0 => tracing::info!(deleted, "pruned stale call checkpoints"),
                        Ok(_) => {}
                        Err(error) => tracing::error!(%error, "failed to prune call checkpoints"),
                    }
                    match tr_storage::retention::run(state.pool(), full_fidelity_days, per_minute_days).await {
                        Ok(report) => tracing::info!(?report, "decimation pass complete"),
                        Err(error) => tracing::error!(%error, "failed to decimate append-only tables"),
                    }
                }
                _ = sweep_tick.tick() => {
                    let evicted = state.affiliation.evict_stale(Utc::now());
                    if evicted > 0 {
                        tracing::debug!(evicted, "evicted stale affiliations");
                    }
                }
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    tracing::info!("starting tr-server");

    let cli = Cli::parse();
    let config_path = cli
        .config
        .canonicalize()
        .with_context(|| format!("config file not found: {}. Create one or specify --config <path>", cli.config.display()))?;
    let file_config = Arc::new(tr_core::file_config::load_config(&config_path)?);
    let config = Arc::new(AppConfig::from_env()?);

    let pool = PgPoolOptions::new().max_connections(20).connect(&config.database_url).await?;
    tracing::info!("connected to database");

    tr_storage::schema::ensure_schema(&pool).await?;
    tr_storage::partition::ensure_upcoming_partitions(&pool, file_config.retention.partition_windows_ahead).await?;
    tracing::info!("schema bootstrapped, partitions precreated");

    let checkpoints_loaded = checkpoints::list_all(&pool).await?;
    let tracker = Arc::new(ActiveCallTracker::new());
    tracker.restore(checkpoints_loaded.into_iter().map(active_call_from_checkpoint).collect());
    tracing::info!(active_calls = tracker.active_count(), "active-call tracker restored from checkpoints");

    let identity = Arc::new(IdentityCache::new());
    let warmup = Arc::new(WarmupGate::new(!identity.is_empty()));
    let affiliation = Arc::new(AffiliationMap::new());
    let recorders = Arc::new(RecorderCache::new());
    let bus = Arc::new(EventBus::new(EVENT_RING_CAPACITY, EVENT_RING_WINDOW, EVENT_CHANNEL_CAPACITY));
    let stats = Arc::new(IngestStats::new());
    let (batchers, batcher_handles) = IngestBatchers::spawn(&file_config.batch, pool.clone());
    let batchers = Arc::new(batchers);

    let broker: Arc<dyn Broker> = Arc::new(MqttBroker::new(&config.broker_url, "tr-server", vec!["#".to_string()])?);

    let state = ServerState {
        db_pool: pool.clone(),
        config: config.clone(),
        file_config: file_config.clone(),
        identity,
        warmup: warmup.clone(),
        tracker,
        affiliation,
        recorders,
        bus,
        stats,
        batchers,
        broker: broker.clone(),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (frame_tx, frame_rx) = mpsc::channel::<InboundFrame>(BROKER_CHANNEL_CAPACITY);

    let _watcher = match &file_config.server.watch_dir {
        Some(dir) => {
            let adapter = tr_transport::FileWatchAdapter::new(dir.clone());
            let watcher = adapter.spawn(frame_tx.clone()).with_context(|| format!("failed to watch directory: {dir}"))?;
            tracing::info!(%dir, "watching directory for completed recordings");
            Some(watcher)
        }
        None => None,
    };

    let broker_handle = {
        let broker = broker.clone();
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { broker.run(frame_tx, shutdown_rx).await })
    };

    let warmup_drain_handle = ingest::spawn_warmup_drain(state.clone());
    let ingest_handle = tokio::spawn(ingest::run(state.clone(), frame_rx, shutdown_rx.clone()));
    let maintenance_handle = spawn_maintenance(state.clone(), shutdown_rx.clone());

    let app = routes::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&file_config.server.listen_addr).await?;
    tracing::info!(addr = %file_config.server.listen_addr, "listening");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await
    });

    server_handle.await??;
    tracing::info!("http server stopped, shutting down background tasks");

    let _ = shutdown_tx.send(true);
    let _ = ingest_handle.await;
    let _ = warmup_drain_handle.await;
    let _ = maintenance_handle.await;
    let _ = broker_handle.await;

    drop(state);
    for handle in batcher_handles {
        let _ = handle.await;
    }

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("ctrl-c received, starting graceful shutdown");
}
