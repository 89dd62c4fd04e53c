pub mod cache;

pub use cache::RecorderCache;
