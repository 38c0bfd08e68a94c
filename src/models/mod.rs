//! Data models for crawlstate.

mod catalog;
mod hierarchy;
pub(crate) mod ordered;
mod pattern;
mod snapshot;
mod stats;

pub use catalog::{catalog_hash, CategorySpec};
pub use hierarchy::{Category, CategoryPatterns, SubcategoryRecord};
pub use pattern::{pattern_key, pattern_seq, Pattern, PatternStatus, PatternView, UrlSets};
pub use snapshot::{Position, SearchCounters, Snapshot, SCHEMA_VERSION};
pub use stats::Statistics;
