pub mod cache;
pub mod merge;
pub mod warmup;

pub use cache::IdentityCache;
pub use merge::{merge_systems, MergeOutcome};
pub use warmup::WarmupGate;
