//! Broker frame ingest: warmup gating, identity resolution, and domain
//! dispatch (spec.md §4).

pub mod batchers;
pub mod payload;
pub mod pipeline;

pub use batchers::IngestBatchers;
pub use pipeline::{dispatch_frame, run, spawn_warmup_drain};
