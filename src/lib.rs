//! crawlstate - resumable crawl checkpoint and URL deduplication store.
//!
//! Tracks what crawl work (category → subcategory → search pattern → URL) has
//! been attempted, what succeeded, what failed, and where the next run should
//! pick up. State lives in two files:
//!
//! - a JSON snapshot of the work hierarchy, rewritten atomically after every
//!   mutation ([`repository::WorkHierarchyStore`])
//! - an append-only log of processed URLs ([`repository::ProcessedUrlIndex`])
//!
//! The stores assume a single writer. Running two processes against the same
//! data directory is not detected and will lose updates.
//!
//! ```no_run
//! use crawlstate::models::CategorySpec;
//! use crawlstate::repository::{ProcessedUrlIndex, WorkHierarchyStore};
//! use crawlstate::services::{CompletionRules, PatternRule, SubcategoryPolicy};
//! use crawlstate::utils::DomainFilter;
//!
//! # fn main() -> crawlstate::error::Result<()> {
//! let catalog = vec![CategorySpec::new("Health", ["Dental", "Vision"])];
//! let rules = CompletionRules::new(PatternRule::PendingDrained, SubcategoryPolicy::FixedCount(5));
//! let (mut store, _issues) = WorkHierarchyStore::open("data/crawl_state.json", &catalog, rules)?;
//! let (mut urls, _issues) = ProcessedUrlIndex::load("data/processed_urls.txt", DomainFilter::any())?;
//!
//! let key = store.init_pattern("Health", "Dental", "dental insurance", ["https://example.com/1"])?;
//! if !urls.is_processed("https://example.com/1") {
//!     urls.add("Health", "Dental", "https://example.com/1")?;
//!     store.record_outcome("Health", "Dental", &key, "https://example.com/1", true)?;
//! }
//! println!("{:?}", store.resume_point()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod utils;

pub use error::{Result, StoreError, ValidationIssue};
