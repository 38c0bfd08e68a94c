//! Derived counters over the work hierarchy.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::snapshot::Snapshot;

/// Statistics block stored in the snapshot.
///
/// Never authoritative: rebuilt from the hierarchy on every load and persist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    pub total_categories: u64,
    pub completed_categories: u64,
    pub total_subcategories: u64,
    pub completed_subcategories: u64,
    pub total_patterns: u64,
    pub completed_patterns: u64,
    pub urls_discovered: u64,
    pub urls_pending: u64,
    pub total_downloads: u64,
    /// Downloads confirmed on the current UTC day.
    pub downloads_today: u64,
    pub total_failures: u64,
    pub successful_searches: u64,
    pub failed_searches: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Statistics {
    /// Recompute every counter from the hierarchy. `last_updated` is carried over.
    pub fn compute(snapshot: &Snapshot) -> Self {
        let mut stats = Statistics {
            total_categories: snapshot.categories.len() as u64,
            completed_categories: snapshot.categories.iter().filter(|c| c.completed).count()
                as u64,
            successful_searches: snapshot.searches.successful,
            failed_searches: snapshot.searches.failed,
            downloads_today: snapshot.downloads_on(Utc::now().date_naive()),
            last_updated: snapshot.statistics.last_updated,
            ..Default::default()
        };

        for category in &snapshot.categories {
            stats.total_subcategories += category.subcategories.len() as u64;
            stats.completed_subcategories += category
                .subcategories
                .iter()
                .filter(|sub| {
                    snapshot
                        .subcategory(&category.name, sub)
                        .is_some_and(|record| record.completed)
                })
                .count() as u64;
        }

        let mut discovered: HashSet<&str> = HashSet::new();
        for pattern in snapshot.all_patterns() {
            stats.total_patterns += 1;
            if pattern.is_completed() {
                stats.completed_patterns += 1;
            }
            stats.urls_pending += pattern.urls.pending().len() as u64;
            stats.total_failures += pattern.urls.failed().len() as u64;
            discovered.extend(pattern.urls.discovered().map(String::as_str));
        }
        stats.urls_discovered = discovered.len() as u64;

        stats.total_downloads = snapshot
            .pattern_data
            .iter()
            .flat_map(|c| c.subcategories.iter())
            .map(|s| s.download_count)
            .sum();

        stats
    }

    pub fn pattern_completion_pct(&self) -> f64 {
        percent(self.completed_patterns, self.total_patterns)
    }

    pub fn subcategory_completion_pct(&self) -> f64 {
        percent(self.completed_subcategories, self.total_subcategories)
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
