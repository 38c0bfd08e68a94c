//! Repository layer for checkpoint persistence.
//!
//! Two stores share the checkpoint writer:
//! - `processed_urls`: append-only log of processed URLs
//! - `hierarchy`: category/subcategory/pattern snapshot

pub mod checkpoint;
pub mod hierarchy;
pub mod processed_urls;

pub use hierarchy::{
    CategoryProgress, OutcomeEffect, ProgressSummary, SubcategoryProgress, WorkHierarchyStore,
};
pub use processed_urls::{ProcessedUrlIndex, ProcessedUrlStats, UrlCounts};
