use chrono::{DateTime, Utc};

/// One frame handed synchronously from the transport to the router
/// (spec.md §4.1). `source_instance` distinguishes multiple upstream
/// instances publishing onto the same broker namespace.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: DateTime<Utc>,
    pub source_instance: Option<String>,
}
