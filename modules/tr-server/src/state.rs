use std::sync::Arc;
use tr_affiliation::AffiliationMap;
use tr_calls::ActiveCallTracker;
use tr_core::{AppConfig, FileConfig};
use tr_events::EventBus;
use tr_identity::{IdentityCache, WarmupGate};
use tr_recorders::RecorderCache;
use tr_transport::Broker;

use crate::ingest::batchers::IngestBatchers;
use crate::stats::IngestStats;

/// Everything a handler or ingest worker needs, process-wide. Each
/// component owns its own synchronization (spec.md §9: "none should be
/// exposed as package-level variables") — this struct is just the shared
/// handle every task clones.
#[derive(Clone)]
pub struct ServerState {
    pub db_pool: sqlx::PgPool,
    pub config: Arc<AppConfig>,
    pub file_config: Arc<FileConfig>,
    pub identity: Arc<IdentityCache>,
    pub warmup: Arc<WarmupGate>,
    pub tracker: Arc<ActiveCallTracker>,
    pub affiliation: Arc<AffiliationMap>,
    pub recorders: Arc<RecorderCache>,
    pub bus: Arc<EventBus>,
    pub stats: Arc<IngestStats>,
    pub batchers: Arc<IngestBatchers>,
    pub broker: Arc<dyn Broker>,
}

impl ServerState {
    pub fn pool(&self) -> &sqlx::PgPool {
        &self.db_pool
    }
}
