pub mod dedup;
pub mod tracker;

pub use dedup::{assign as assign_dedup_group, start_time_bucket, DedupOutcome, DEAFFILIATION_COALESCE_WINDOW};
pub use tracker::{ActiveCall, ActiveCallTracker};
