//! Site-wide guard against re-running completed search text.

use std::collections::HashSet;

use crate::models::Snapshot;
use crate::utils::normalize_pattern;

/// Normalized texts of every completed pattern, across all categories.
#[derive(Debug, Clone, Default)]
pub struct PatternGuard {
    completed: HashSet<String>,
}

impl PatternGuard {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            completed: snapshot
                .all_patterns()
                .filter(|p| p.is_completed())
                .map(|p| normalize_pattern(&p.text))
                .collect(),
        }
    }

    /// True unless a completed pattern normalizes to the same text.
    pub fn is_unique(&self, text: &str) -> bool {
        !self.completed.contains(&normalize_pattern(text))
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }
}

/// One-shot check against a snapshot.
pub fn is_pattern_unique(snapshot: &Snapshot, text: &str) -> bool {
    PatternGuard::from_snapshot(snapshot).is_unique(text)
}
