//! Shared utility functions.
//!
//! - `url_filter`: allow-list check for recorded URLs
//! - `normalize`: search-text normalization

mod normalize;
mod url_filter;

pub use normalize::normalize_pattern;
pub use url_filter::DomainFilter;
