//! Snapshot-backed work hierarchy store.
//!
//! Split into submodules:
//! - `mod.rs` (this file): store struct, open/persist, catalog registration
//! - `outcomes.rs`: pattern creation and outcome recording
//! - `queries.rs`: status lookups, completion predicates, progress views
//! - `progress.rs`: cursor, search counters and resume planning
//!
//! Every mutating call rewrites the snapshot before returning.

mod outcomes;
mod progress;
mod queries;

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use super::checkpoint;
use crate::error::{Result, ValidationIssue};
use crate::models::{
    catalog_hash, Category, CategorySpec, PatternStatus, Position, Snapshot, Statistics,
};
use crate::services::completion::{self, CompletionRules};

pub use queries::{CategoryProgress, ProgressSummary, SubcategoryProgress};

/// What a recorded outcome changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeEffect {
    /// The URL moved into `downloaded` for the first time.
    pub newly_downloaded: bool,
    pub pattern_completed: bool,
    pub subcategory_completed: bool,
    pub category_completed: bool,
}

/// The category → subcategory → pattern → URL tree for one crawl.
#[derive(Debug)]
pub struct WorkHierarchyStore {
    path: PathBuf,
    snapshot: Snapshot,
    rules: CompletionRules,
}

impl WorkHierarchyStore {
    /// Open the store at `path`, registering the catalog.
    ///
    /// New catalog categories are appended in catalog order; known ones keep
    /// their position and gain any new subcategory names. The healed snapshot
    /// is written back before returning.
    pub fn open(
        path: impl AsRef<Path>,
        catalog: &[CategorySpec],
        rules: CompletionRules,
    ) -> Result<(Self, Vec<ValidationIssue>)> {
        let path = path.as_ref().to_path_buf();
        let (snapshot, issues) = checkpoint::load_snapshot(&path)?;
        let mut store = Self {
            path,
            snapshot,
            rules,
        };
        store.register_catalog(catalog);
        store.reevaluate_all();
        store.write()?;
        info!(
            "Opened work hierarchy {} ({} categories, {} patterns)",
            store.path.display(),
            store.snapshot.statistics.total_categories,
            store.snapshot.statistics.total_patterns
        );
        Ok((store, issues))
    }

    fn register_catalog(&mut self, catalog: &[CategorySpec]) {
        for spec in catalog {
            let idx = match self.snapshot.category_index(&spec.name) {
                Some(idx) => idx,
                None => {
                    debug!("Registering category {}", spec.name);
                    self.snapshot.categories.push(Category::new(spec.name.clone()));
                    self.snapshot.categories.len() - 1
                }
            };
            let category = &mut self.snapshot.categories[idx];
            for sub in &spec.subcategories {
                category.ensure_subcategory(sub);
            }
        }

        if catalog.is_empty() {
            return;
        }
        let hash = catalog_hash(catalog);
        match &self.snapshot.catalog_hash {
            Some(previous) if *previous != hash => {
                info!("Category catalog changed since the last run");
            }
            _ => {}
        }
        self.snapshot.catalog_hash = Some(hash);
    }

    /// Apply the current rules to every record. Flags only ever flip to done.
    fn reevaluate_all(&mut self) {
        let rules = self.rules;
        for bucket in &mut self.snapshot.pattern_data {
            for record in &mut bucket.subcategories {
                for pattern in &mut record.patterns {
                    if !pattern.is_completed()
                        && completion::is_pattern_complete(pattern, rules.pattern)
                    {
                        pattern.status = PatternStatus::Completed;
                    }
                }
                if !record.completed
                    && completion::is_subcategory_complete(record, rules.subcategory)
                {
                    record.completed = true;
                }
            }
        }
        for category in &mut self.snapshot.categories {
            if !category.completed {
                let records = self
                    .snapshot
                    .pattern_data
                    .iter()
                    .find(|c| c.name == category.name);
                category.completed =
                    completion::is_category_complete(category, records, rules.subcategory);
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn rules(&self) -> CompletionRules {
        self.rules
    }

    /// Stamp `last_updated`, recompute statistics and atomically rewrite the
    /// snapshot.
    pub fn persist(&mut self) -> Result<()> {
        self.snapshot.statistics.last_updated = Some(Utc::now());
        self.write()
    }

    fn write(&mut self) -> Result<()> {
        self.snapshot.statistics = Statistics::compute(&self.snapshot);
        checkpoint::save_snapshot(&self.path, &self.snapshot)
    }

    /// Run one mutating call as a unit: apply `change`, then persist. If
    /// either step fails the in-memory snapshot is put back as it was.
    fn transact<T>(&mut self, change: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.snapshot.clone();
        let result = change(self).and_then(|value| self.persist().map(|()| value));
        if result.is_err() {
            self.snapshot = saved;
        }
        result
    }

    fn set_position(&mut self, category: &str, subcategory: &str, pattern_key: Option<&str>) {
        let Some(category_index) = self.snapshot.category_index(category) else {
            return;
        };
        let Some(subcategory_index) =
            self.snapshot.categories[category_index].subcategory_index(subcategory)
        else {
            return;
        };
        self.snapshot.current_position = Some(Position {
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            category_index,
            subcategory_index,
            pattern_key: pattern_key.map(str::to_string),
            updated_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::error::StoreError;
    use crate::services::completion::{PatternRule, SubcategoryPolicy};
    use crate::services::resume::ResumeDecision;
    use tempfile::tempdir;

    fn catalog() -> Vec<CategorySpec> {
        vec![
            CategorySpec::new("Health", ["Dental", "Vision"]),
            CategorySpec::new("Travel", ["Flights"]),
        ]
    }

    fn rules(n: u64) -> CompletionRules {
        CompletionRules::new(PatternRule::PendingDrained, SubcategoryPolicy::FixedCount(n))
    }

    fn open(path: &Path, n: u64) -> WorkHierarchyStore {
        let (store, issues) = WorkHierarchyStore::open(path, &catalog(), rules(n)).unwrap();
        assert!(issues.is_empty(), "{:?}", issues);
        store
    }

    #[test]
    fn dental_insurance_scenario() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crawl_state.json");
        let mut store = open(&path, 5);

        let key = store
            .init_pattern("Health", "Dental", "dental insurance", ["u1", "u2", "u3"])
            .unwrap();
        assert_eq!(key, "pattern_1");

        for url in ["u1", "u2"] {
            let effect = store
                .record_outcome("Health", "Dental", &key, url, true)
                .unwrap();
            assert!(effect.newly_downloaded);
            assert!(!effect.pattern_completed);
        }
        let effect = store
            .record_outcome("Health", "Dental", &key, "u3", true)
            .unwrap();
        assert!(effect.pattern_completed);
        assert!(!effect.subcategory_completed);

        let view = store
            .pattern_status("Health", "Dental", "dental insurance")
            .unwrap();
        assert_eq!(view.key, "pattern_1");
        assert_eq!(view.downloaded, vec!["u1", "u2", "u3"]);
        assert!(view.pending.is_empty());
        assert_eq!(store.subcategory_downloads("Health", "Dental").unwrap(), 3);
        assert!(!store.is_pattern_unique("Dental Insurance!"));
        assert!(store.is_pattern_unique("dental plans"));
    }

    #[test]
    fn unknown_references_are_not_found() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir.path().join("state.json"), 1);

        let err = store
            .init_pattern("Nowhere", "x", "text", ["u1"])
            .unwrap_err();
        assert!(err.is_not_found());

        let key = store
            .init_pattern("Health", "Dental", "dental", ["u1"])
            .unwrap();
        for (cat, sub, k, url) in [
            ("Health", "Vision", key.as_str(), "u1"),
            ("Health", "Dental", "pattern_9", "u1"),
        ] {
            let err = store.record_outcome(cat, sub, k, url, true).unwrap_err();
            assert!(matches!(err, StoreError::NotFound { .. }), "{}", err);
        }
        assert!(store.pattern_status("Health", "Dental", "nope").is_err());
    }

    #[test]
    fn lazy_subcategory_is_appended() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir.path().join("state.json"), 1);
        store
            .init_pattern("Health", "Hearing", "hearing aids", ["u1"])
            .unwrap();
        let health = store.snapshot().category("Health").unwrap();
        assert_eq!(health.subcategories, vec!["Dental", "Vision", "Hearing"]);
    }

    #[test]
    fn empty_pattern_completes_immediately() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir.path().join("state.json"), 1);
        let key = store
            .init_pattern("Health", "Dental", "dental", Vec::<String>::new())
            .unwrap();
        assert!(store.is_pattern_complete("Health", "Dental", &key).unwrap());
        assert!(!store.is_subcategory_complete("Health", "Dental").unwrap());
    }

    #[test]
    fn completion_cascades_to_category() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir.path().join("state.json"), 1);

        let dental = store
            .init_pattern("Health", "Dental", "dental", ["a"])
            .unwrap();
        let effect = store
            .record_outcome("Health", "Dental", &dental, "a", true)
            .unwrap();
        assert!(effect.subcategory_completed);
        assert!(!effect.category_completed);

        let vision = store
            .init_pattern("Health", "Vision", "vision", ["b"])
            .unwrap();
        let effect = store
            .record_outcome("Health", "Vision", &vision, "b", true)
            .unwrap();
        assert!(effect.category_completed);
        assert!(store.is_category_complete("Health").unwrap());
        assert!(!store.is_category_complete("Travel").unwrap());
    }

    #[test]
    fn failure_never_demotes_download() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir.path().join("state.json"), 5);
        let key = store
            .init_pattern("Health", "Dental", "dental", ["a", "b"])
            .unwrap();
        store
            .record_outcome("Health", "Dental", &key, "a", true)
            .unwrap();
        store
            .record_outcome("Health", "Dental", &key, "a", false)
            .unwrap();
        store
            .record_outcome("Health", "Dental", &key, "b", false)
            .unwrap();
        store
            .record_outcome("Health", "Dental", &key, "b", false)
            .unwrap();

        let view = store.pattern_status("Health", "Dental", &key).unwrap();
        assert_eq!(view.downloaded, vec!["a"]);
        assert_eq!(view.failed, vec!["b"]);
        assert_eq!(store.subcategory_downloads("Health", "Dental").unwrap(), 1);

        let effect = store
            .record_outcome("Health", "Dental", &key, "a", true)
            .unwrap();
        assert!(!effect.newly_downloaded);
        assert_eq!(store.subcategory_downloads("Health", "Dental").unwrap(), 1);
    }

    #[test]
    fn reopen_keeps_state_and_resumes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let key = {
            let mut store = open(&path, 5);
            let key = store
                .init_pattern("Health", "Vision", "vision", ["u1", "u2"])
                .unwrap();
            store
                .record_outcome("Health", "Vision", &key, "u1", true)
                .unwrap();
            store.record_search(true).unwrap();
            key
        };

        let store = open(&path, 5);
        assert_eq!(store.subcategory_downloads("Health", "Vision").unwrap(), 1);
        assert_eq!(store.snapshot().statistics.successful_searches, 1);
        assert_eq!(
            store.resume_point().unwrap(),
            ResumeDecision::ResumeDownloads {
                category: "Health".into(),
                subcategory: "Vision".into(),
                pattern_key: key,
                pending_urls: vec!["u2".into()],
            }
        );
    }

    #[test]
    fn pattern_keys_keep_counting() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        {
            let mut store = open(&path, 5);
            store.init_pattern("Health", "Dental", "a", ["u1"]).unwrap();
            store.init_pattern("Health", "Dental", "b", ["u2"]).unwrap();
        }
        let mut store = open(&path, 5);
        let key = store.init_pattern("Health", "Dental", "c", ["u3"]).unwrap();
        assert_eq!(key, "pattern_3");
    }

    #[test]
    fn position_is_validated() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir.path().join("state.json"), 1);
        store.update_position("Travel", "Flights").unwrap();
        let position = store.snapshot().current_position.clone().unwrap();
        assert_eq!((position.category_index, position.subcategory_index), (1, 0));
        assert!(store.update_position("Travel", "Trains").is_err());
    }

    #[test]
    fn unlisted_url_joins_pattern() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir.path().join("state.json"), 5);
        let key = store
            .init_pattern("Health", "Dental", "dental", ["u1"])
            .unwrap();

        let effect = store
            .record_outcome("Health", "Dental", &key, "u9", true)
            .unwrap();
        assert!(effect.newly_downloaded);
        let effect = store
            .record_outcome("Health", "Dental", &key, "u9", true)
            .unwrap();
        assert!(!effect.newly_downloaded);
        store
            .record_outcome("Health", "Dental", &key, "u8", false)
            .unwrap();

        let view = store.pattern_status("Health", "Dental", &key).unwrap();
        assert_eq!(view.pending, vec!["u1"]);
        assert_eq!(view.downloaded, vec!["u9"]);
        assert_eq!(view.failed, vec!["u8"]);
        assert_eq!(store.subcategory_downloads("Health", "Dental").unwrap(), 1);
        assert!(store.record_outcome("Health", "Dental", &key, "  ", true).is_err());
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("data");
        let mut store = open(&data.join("state.json"), 5);
        let key = store
            .init_pattern("Health", "Dental", "dental", ["u1"])
            .unwrap();

        fs::remove_dir_all(&data).unwrap();
        fs::write(&data, b"").unwrap();
        assert!(store
            .init_pattern("Health", "Vision", "vision", ["v1"])
            .is_err());
        assert!(store
            .record_outcome("Health", "Dental", &key, "u1", true)
            .is_err());
        assert!(store.record_search(true).is_err());
        assert!(store.update_position("Travel", "Flights").is_err());

        assert_eq!(store.subcategory_view("Health", "Vision").unwrap().patterns, 0);
        assert_eq!(store.subcategory_downloads("Health", "Dental").unwrap(), 0);
        assert_eq!(store.snapshot().searches.successful, 0);
        assert_eq!(store.snapshot().downloads_on(Utc::now().date_naive()), 0);
        let position = store.snapshot().current_position.clone().unwrap();
        assert_eq!((position.category_index, position.subcategory_index), (0, 0));

        fs::remove_file(&data).unwrap();
        fs::create_dir(&data).unwrap();
        let retry = store
            .init_pattern("Health", "Vision", "vision", ["v1"])
            .unwrap();
        assert_eq!(retry, "pattern_1");
        assert_eq!(store.patterns("Health", "Vision").unwrap().len(), 1);
        let effect = store
            .record_outcome("Health", "Dental", &key, "u1", true)
            .unwrap();
        assert!(effect.newly_downloaded);
        assert_eq!(store.subcategory_downloads("Health", "Dental").unwrap(), 1);

        let reopened = open(&data.join("state.json"), 5);
        assert_eq!(reopened.progress_summary(), store.progress_summary());
    }

    #[test]
    fn daily_count_tracks_new_downloads_only() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir.path().join("state.json"), 5);
        let today = Utc::now().date_naive();
        let key = store
            .init_pattern("Health", "Dental", "dental", ["a", "b", "c"])
            .unwrap();

        store
            .record_outcome("Health", "Dental", &key, "a", true)
            .unwrap();
        store
            .record_outcome("Health", "Dental", &key, "a", true)
            .unwrap();
        store
            .record_outcome("Health", "Dental", &key, "b", false)
            .unwrap();
        store
            .record_outcome("Health", "Dental", &key, "c", true)
            .unwrap();

        assert_eq!(store.snapshot().downloads_on(today), 2);
        let summary = store.progress_summary();
        assert_eq!(summary.statistics.downloads_today, 2);
        assert_eq!(summary.daily_downloads.get(&today), Some(&2));
        assert_eq!(summary.daily_downloads.len(), 1);
    }

    #[test]
    fn subcategory_view_covers_listed_and_lazy() {
        let dir = tempdir().unwrap();
        let mut store = open(&dir.path().join("state.json"), 2);
        let key = store
            .init_pattern("Health", "Dental", "dental", ["a", "b"])
            .unwrap();
        store
            .record_outcome("Health", "Dental", &key, "a", true)
            .unwrap();

        let dental = store.subcategory_view("Health", "Dental").unwrap();
        assert_eq!(dental.download_count, 1);
        assert_eq!(dental.required_downloads, 2);
        assert_eq!((dental.patterns, dental.completed_patterns), (1, 0));
        assert!(!dental.completed);

        let vision = store.subcategory_view("Health", "Vision").unwrap();
        assert_eq!(vision.name, "Vision");
        assert_eq!(vision.download_count, 0);
        assert_eq!(vision.required_downloads, 2);
        assert_eq!(vision.patterns, 0);

        let err = store.subcategory_view("Health", "Hearing").unwrap_err();
        assert!(err.is_not_found());
        assert!(store.subcategory_view("Nowhere", "Dental").is_err());
    }
}
