//! Single-process event bus: pub/sub with per-subscriber filtering, a
//! bounded replay ring, and slow-consumer disconnection (spec.md §4.8).

pub mod bus;
pub mod filter;
pub mod types;

pub use bus::{EventBus, Subscription};
pub use filter::Filter;
pub use types::BusEvent;
