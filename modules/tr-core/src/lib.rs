pub mod config;
pub mod error;
pub mod file_config;
pub mod types;

pub use config::AppConfig;
pub use error::{AmbiguousCandidate, TrError, TrResult};
pub use file_config::{FileConfig, RawArchiveMode};
pub use types::*;
