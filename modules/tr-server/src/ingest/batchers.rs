//! Bundles the high-volume batchers the ingest pipeline enqueues into
//! (spec.md §4.5): raw archive, trunking messages, recorder snapshots,
//! and decode rates all use the shared linger/size batcher; console logs
//! ride along on the same policy since they share the same volume
//! profile. Smaller per-row handlers (calls, unit events) bypass batching
//! entirely for freshness.

use std::time::Duration;
use tokio::task::JoinHandle;
use tr_batch::Batcher;
use tr_core::file_config::BatchConfig;
use tr_core::{ConsoleLog, DecodeRate, RawArchiveRow, RecorderSnapshot, TrunkingMessage};
use tr_storage::repo::{console_logs, decode_rates, raw_archive, recorder_snapshots, trunking_messages};

pub struct IngestBatchers {
    pub raw_archive: Batcher<RawArchiveRow>,
    pub trunking_messages: Batcher<TrunkingMessage>,
    pub recorder_snapshots: Batcher<RecorderSnapshot>,
    pub decode_rates: Batcher<DecodeRate>,
    pub console_logs: Batcher<ConsoleLog>,
}

impl IngestBatchers {
    /// Spawns one flush loop per sink. Callers keep the returned handles
    /// only to await them during an orderly shutdown; dropping an
    /// `IngestBatchers` also lets each loop drain and exit.
    pub fn spawn(config: &BatchConfig, pool: sqlx::PgPool) -> (Self, Vec<JoinHandle<()>>) {
        let max_batch_size = config.max_batch_size;
        let max_linger = Duration::from_millis(config.max_linger_ms);
        let capacity = config.staging_capacity;

        let raw_archive_pool = pool.clone();
        let (raw_archive, h1) = Batcher::spawn(max_batch_size, max_linger, capacity, move |rows: Vec<RawArchiveRow>| {
            let pool = raw_archive_pool.clone();
            async move { raw_archive::insert_batch(&pool, &rows).await.map(|_| ()) }
        });

        let trunking_pool = pool.clone();
        let (trunking_messages, h2) = Batcher::spawn(max_batch_size, max_linger, capacity, move |rows: Vec<TrunkingMessage>| {
            let pool = trunking_pool.clone();
            async move { trunking_messages::insert_batch(&pool, &rows).await.map(|_| ()) }
        });

        let recorders_pool = pool.clone();
        let (recorder_snapshots, h3) = Batcher::spawn(max_batch_size, max_linger, capacity, move |rows: Vec<RecorderSnapshot>| {
            let pool = recorders_pool.clone();
            async move { recorder_snapshots::insert_batch(&pool, &rows).await.map(|_| ()) }
        });

        let rates_pool = pool.clone();
        let (decode_rates, h4) = Batcher::spawn(max_batch_size, max_linger, capacity, move |rows: Vec<DecodeRate>| {
            let pool = rates_pool.clone();
            async move { decode_rates::insert_batch(&pool, &rows).await.map(|_| ()) }
        });

        let (console_logs, h5) = Batcher::spawn(max_batch_size, max_linger, capacity, move |rows: Vec<ConsoleLog>| {
            let pool = pool.clone();
            async move { console_logs::insert_batch(&pool, &rows).await.map(|_| ()) }
        });

        (Self { raw_archive, trunking_messages, recorder_snapshots, decode_rates, console_logs }, vec![h1, h2, h3, h4, h5])
    }
}
