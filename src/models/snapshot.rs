//! The persisted work-hierarchy document.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::hierarchy::{Category, CategoryPatterns, SubcategoryRecord};
use super::ordered;
use super::pattern::Pattern;
use super::stats::Statistics;

/// Current snapshot schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Last-touched position in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub category: String,
    pub subcategory: String,
    pub category_index: usize,
    pub subcategory_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_key: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Search attempts reported by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCounters {
    pub successful: u64,
    pub failed: u64,
}

/// Whole-hierarchy checkpoint, rewritten atomically on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_hash: Option<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default, with = "ordered")]
    pub pattern_data: Vec<CategoryPatterns>,
    #[serde(default)]
    pub searches: SearchCounters,
    /// Newly confirmed downloads per UTC day.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub daily_downloads: BTreeMap<NaiveDate, u64>,
    /// Derived; recomputed on load and before every write.
    #[serde(default)]
    pub statistics: Statistics,
    #[serde(default)]
    pub current_position: Option<Position>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            catalog_hash: None,
            categories: Vec::new(),
            pattern_data: Vec::new(),
            searches: SearchCounters::default(),
            daily_downloads: BTreeMap::new(),
            statistics: Statistics::default(),
            current_position: None,
        }
    }
}

impl Snapshot {
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn category_index(&self, name: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.name == name)
    }

    pub fn category_patterns(&self, name: &str) -> Option<&CategoryPatterns> {
        self.pattern_data.iter().find(|c| c.name == name)
    }

    pub fn subcategory(&self, category: &str, subcategory: &str) -> Option<&SubcategoryRecord> {
        self.category_patterns(category)?.subcategory(subcategory)
    }

    pub(crate) fn subcategory_mut(
        &mut self,
        category: &str,
        subcategory: &str,
    ) -> Option<&mut SubcategoryRecord> {
        self.pattern_data
            .iter_mut()
            .find(|c| c.name == category)?
            .subcategory_mut(subcategory)
    }

    /// Get the record for a subcategory, creating the category bucket and the
    /// record on first use.
    pub(crate) fn ensure_subcategory_record(
        &mut self,
        category: &str,
        subcategory: &str,
    ) -> &mut SubcategoryRecord {
        let cat_idx = match self.pattern_data.iter().position(|c| c.name == category) {
            Some(idx) => idx,
            None => {
                self.pattern_data.push(CategoryPatterns::new(category));
                self.pattern_data.len() - 1
            }
        };
        let bucket = &mut self.pattern_data[cat_idx];
        let sub_idx = match bucket
            .subcategories
            .iter()
            .position(|s| s.name == subcategory)
        {
            Some(idx) => idx,
            None => {
                bucket.subcategories.push(SubcategoryRecord::new(subcategory));
                bucket.subcategories.len() - 1
            }
        };
        &mut bucket.subcategories[sub_idx]
    }

    /// Every pattern with its category and subcategory, in scan order:
    /// category order, subcategory order, then pattern order.
    pub fn patterns_in_order(&self) -> Vec<(&str, &str, &Pattern)> {
        let mut out = Vec::new();
        for category in &self.categories {
            let Some(bucket) = self.category_patterns(&category.name) else {
                continue;
            };
            for sub_name in &category.subcategories {
                if let Some(record) = bucket.subcategory(sub_name) {
                    for pattern in &record.patterns {
                        out.push((category.name.as_str(), sub_name.as_str(), pattern));
                    }
                }
            }
        }
        out
    }

    /// Downloads confirmed on `day` (UTC).
    pub fn downloads_on(&self, day: NaiveDate) -> u64 {
        self.daily_downloads.get(&day).copied().unwrap_or(0)
    }

    /// Every pattern regardless of catalog membership.
    pub fn all_patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.pattern_data
            .iter()
            .flat_map(|c| c.subcategories.iter())
            .flat_map(|s| s.patterns.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_uses_current_schema() {
        let snapshot = Snapshot::default();
        assert_eq!(snapshot.schema_version, SCHEMA_VERSION);
        assert!(snapshot.current_position.is_none());
    }

    #[test]
    fn missing_sections_default_on_parse() {
        let snapshot: Snapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot.schema_version, 0);
        assert!(snapshot.categories.is_empty());
        assert!(snapshot.pattern_data.is_empty());
        assert!(snapshot.daily_downloads.is_empty());
    }

    #[test]
    fn daily_downloads_use_date_keys() {
        let json = r#"{"daily_downloads": {"2024-03-01": 4, "2024-03-02": 1}}"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(snapshot.downloads_on(day), 4);
        assert_eq!(snapshot.downloads_on(day.succ_opt().unwrap()), 1);
        assert_eq!(snapshot.downloads_on(NaiveDate::MIN), 0);

        let out = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(out["daily_downloads"]["2024-03-02"], 1);
    }

    #[test]
    fn scan_order_follows_category_list() {
        let mut snapshot = Snapshot::default();
        let mut health = Category::new("Health");
        health.subcategories = vec!["Vision".into(), "Dental".into()];
        snapshot.categories.push(health);

        for (sub, key) in [("Dental", "pattern_1"), ("Vision", "pattern_1")] {
            let record = snapshot.ensure_subcategory_record("Health", sub);
            record
                .patterns
                .push(Pattern::new(key.into(), format!("{} insurance", sub), ["u"]));
        }

        let order: Vec<&str> = snapshot
            .patterns_in_order()
            .into_iter()
            .map(|(_, sub, _)| sub)
            .collect();
        assert_eq!(order, vec!["Vision", "Dental"]);
    }
}
