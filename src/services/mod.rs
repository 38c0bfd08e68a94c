//! Service layer for crawlstate decision logic.
//!
//! Pure rules that the stores and the CLI consult; none of them write to disk.

pub mod completion;
pub mod pattern_guard;
pub mod resume;

pub use completion::{CompletionRules, PatternRule, SubcategoryPolicy};
pub use pattern_guard::PatternGuard;
pub use resume::{plan, resume_from_disk, ResumeDecision};
