//! Read-only lookups over the hierarchy.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::WorkHierarchyStore;
use crate::error::{Result, StoreError};
use crate::models::{Category, PatternView, Position, Snapshot, Statistics, SubcategoryRecord};
use crate::services::completion::{self, SubcategoryPolicy};
use crate::services::pattern_guard;

/// Progress of one subcategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubcategoryProgress {
    pub name: String,
    pub completed: bool,
    pub download_count: u64,
    pub required_downloads: u64,
    pub patterns: usize,
    pub completed_patterns: usize,
}

impl SubcategoryProgress {
    fn new(name: &str, record: Option<&SubcategoryRecord>, policy: SubcategoryPolicy) -> Self {
        match record {
            Some(record) => Self {
                name: name.to_string(),
                completed: completion::is_subcategory_complete(record, policy),
                download_count: record.download_count,
                required_downloads: completion::required_downloads(record, policy),
                patterns: record.patterns.len(),
                completed_patterns: record.patterns.iter().filter(|p| p.is_completed()).count(),
            },
            None => Self {
                name: name.to_string(),
                completed: false,
                download_count: 0,
                required_downloads: completion::required_downloads(
                    &SubcategoryRecord::new(name),
                    policy,
                ),
                patterns: 0,
                completed_patterns: 0,
            },
        }
    }
}

/// Progress of one category and its subcategories, in crawl order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryProgress {
    pub name: String,
    pub completed: bool,
    pub subcategories: Vec<SubcategoryProgress>,
}

/// Whole-crawl progress report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub statistics: Statistics,
    pub categories: Vec<CategoryProgress>,
    pub current_position: Option<Position>,
    /// Newly confirmed downloads per UTC day, oldest first.
    pub daily_downloads: BTreeMap<NaiveDate, u64>,
}

impl ProgressSummary {
    /// Build the report straight from a snapshot, without opening a store.
    pub fn from_snapshot(snapshot: &Snapshot, policy: SubcategoryPolicy) -> Self {
        let categories = snapshot
            .categories
            .iter()
            .map(|category| CategoryProgress {
                name: category.name.clone(),
                completed: category.completed,
                subcategories: category
                    .subcategories
                    .iter()
                    .map(|sub| {
                        SubcategoryProgress::new(
                            sub,
                            snapshot.subcategory(&category.name, sub),
                            policy,
                        )
                    })
                    .collect(),
            })
            .collect();
        Self {
            statistics: snapshot.statistics.clone(),
            categories,
            current_position: snapshot.current_position.clone(),
            daily_downloads: snapshot.daily_downloads.clone(),
        }
    }

    pub fn remaining_subcategories(&self) -> usize {
        self.categories
            .iter()
            .flat_map(|c| c.subcategories.iter())
            .filter(|s| !s.completed)
            .count()
    }
}

impl WorkHierarchyStore {
    fn known_category(&self, category: &str) -> Result<&Category> {
        self.snapshot
            .category(category)
            .ok_or_else(|| StoreError::not_found("category", category))
    }

    fn known_record(&self, category: &str, subcategory: &str) -> Result<&SubcategoryRecord> {
        self.known_category(category)?;
        self.snapshot
            .subcategory(category, subcategory)
            .ok_or_else(|| {
                StoreError::not_found("subcategory", format!("{}/{}", category, subcategory))
            })
    }

    /// Look up a pattern by key, falling back to its exact text.
    pub fn pattern_status(
        &self,
        category: &str,
        subcategory: &str,
        key_or_text: &str,
    ) -> Result<PatternView> {
        let record = self.known_record(category, subcategory)?;
        let pattern = record.find_pattern(key_or_text).ok_or_else(|| {
            StoreError::not_found(
                "pattern",
                format!("{}/{}/{}", category, subcategory, key_or_text),
            )
        })?;
        Ok(PatternView::new(category, subcategory, pattern))
    }

    pub fn is_pattern_complete(&self, category: &str, subcategory: &str, key: &str) -> Result<bool> {
        let record = self.known_record(category, subcategory)?;
        let pattern = record.pattern(key).ok_or_else(|| {
            StoreError::not_found("pattern", format!("{}/{}/{}", category, subcategory, key))
        })?;
        Ok(pattern.is_completed() || completion::is_pattern_complete(pattern, self.rules.pattern))
    }

    /// A listed subcategory with no recorded work is simply incomplete.
    pub fn is_subcategory_complete(&self, category: &str, subcategory: &str) -> Result<bool> {
        let entry = self.known_category(category)?;
        match self.snapshot.subcategory(category, subcategory) {
            Some(record) => Ok(completion::is_subcategory_complete(
                record,
                self.rules.subcategory,
            )),
            None if entry.subcategory_index(subcategory).is_some() => Ok(false),
            None => Err(StoreError::not_found(
                "subcategory",
                format!("{}/{}", category, subcategory),
            )),
        }
    }

    pub fn is_category_complete(&self, category: &str) -> Result<bool> {
        let entry = self.known_category(category)?;
        Ok(entry.completed
            || completion::is_category_complete(
                entry,
                self.snapshot.category_patterns(category),
                self.rules.subcategory,
            ))
    }

    /// Confirmed downloads recorded against a subcategory.
    pub fn subcategory_downloads(&self, category: &str, subcategory: &str) -> Result<u64> {
        let entry = self.known_category(category)?;
        match self.snapshot.subcategory(category, subcategory) {
            Some(record) => Ok(record.download_count),
            None if entry.subcategory_index(subcategory).is_some() => Ok(0),
            None => Err(StoreError::not_found(
                "subcategory",
                format!("{}/{}", category, subcategory),
            )),
        }
    }

    /// Progress of one subcategory. A catalog subcategory with no patterns
    /// yet reports zero downloads.
    pub fn subcategory_view(&self, category: &str, subcategory: &str) -> Result<SubcategoryProgress> {
        let entry = self.known_category(category)?;
        let record = self.snapshot.subcategory(category, subcategory);
        if record.is_none() && entry.subcategory_index(subcategory).is_none() {
            return Err(StoreError::not_found(
                "subcategory",
                format!("{}/{}", category, subcategory),
            ));
        }
        Ok(SubcategoryProgress::new(
            subcategory,
            record,
            self.rules.subcategory,
        ))
    }

    /// Every pattern of a subcategory, in creation order.
    pub fn patterns(&self, category: &str, subcategory: &str) -> Result<Vec<PatternView>> {
        let record = self.known_record(category, subcategory)?;
        Ok(record
            .patterns
            .iter()
            .map(|p| PatternView::new(category, subcategory, p))
            .collect())
    }

    /// True unless a completed pattern anywhere normalizes to the same text.
    pub fn is_pattern_unique(&self, text: &str) -> bool {
        pattern_guard::is_pattern_unique(&self.snapshot, text)
    }

    pub fn progress_summary(&self) -> ProgressSummary {
        ProgressSummary::from_snapshot(&self.snapshot, self.rules.subcategory)
    }
}
