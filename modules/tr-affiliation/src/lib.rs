pub mod map;

pub use map::AffiliationMap;
