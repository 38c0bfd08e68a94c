//! Resume planning.
//!
//! Decides where a new run picks up, from the on-disk snapshot alone. The
//! same snapshot always produces the same decision.

use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::models::{Pattern, Snapshot};
use crate::repository::checkpoint;
use crate::services::completion::{is_subcategory_complete, SubcategoryPolicy};

/// Next unit of work for the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ResumeDecision {
    /// Finish downloading the pending URLs of an unfinished pattern.
    ResumeDownloads {
        category: String,
        subcategory: String,
        pattern_key: String,
        pending_urls: Vec<String>,
    },
    /// Start a new pattern; `pattern_index` is the number already recorded.
    StartNewPattern {
        category: String,
        subcategory: String,
        pattern_index: usize,
    },
    /// Every known subcategory is complete.
    AllComplete,
}

impl ResumeDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResumeDownloads { .. } => "resume_downloads",
            Self::StartNewPattern { .. } => "start_new_pattern",
            Self::AllComplete => "all_complete",
        }
    }
}

/// Read the snapshot at `path` and plan from it.
///
/// A missing snapshot plans from an empty hierarchy. A snapshot that exists
/// but cannot be read or parsed is an error, never a silent fresh start.
pub fn resume_from_disk(path: &Path, policy: SubcategoryPolicy) -> Result<ResumeDecision> {
    let snapshot = checkpoint::read_snapshot(path)?.unwrap_or_default();
    Ok(plan(&snapshot, policy))
}

/// Plan from an in-memory snapshot.
pub fn plan(snapshot: &Snapshot, policy: SubcategoryPolicy) -> ResumeDecision {
    if let Some(decision) = unfinished_pattern(snapshot) {
        return decision;
    }
    next_open_subcategory(snapshot, policy).unwrap_or(ResumeDecision::AllComplete)
}

/// First in-progress pattern with pending URLs, in category, subcategory and
/// pattern-number order.
fn unfinished_pattern(snapshot: &Snapshot) -> Option<ResumeDecision> {
    for category in &snapshot.categories {
        for sub_name in &category.subcategories {
            let Some(record) = snapshot.subcategory(&category.name, sub_name) else {
                continue;
            };
            let mut patterns: Vec<&Pattern> = record.patterns.iter().collect();
            patterns.sort_by_key(|p| p.seq().unwrap_or(u32::MAX));
            if let Some(pattern) = patterns
                .into_iter()
                .find(|p| !p.is_completed() && p.has_pending())
            {
                return Some(ResumeDecision::ResumeDownloads {
                    category: category.name.clone(),
                    subcategory: sub_name.clone(),
                    pattern_key: pattern.key.clone(),
                    pending_urls: pattern.urls.pending().iter().cloned().collect(),
                });
            }
        }
    }
    None
}

/// Walk forward from the cursor, wrapping once, to the first incomplete
/// subcategory.
fn next_open_subcategory(snapshot: &Snapshot, policy: SubcategoryPolicy) -> Option<ResumeDecision> {
    let slots: Vec<(&str, &str)> = snapshot
        .categories
        .iter()
        .flat_map(|c| {
            c.subcategories
                .iter()
                .map(move |s| (c.name.as_str(), s.as_str()))
        })
        .collect();
    if slots.is_empty() {
        return None;
    }

    let start = snapshot
        .current_position
        .as_ref()
        .and_then(|pos| {
            slots.iter().position(|(c, s)| *c == pos.category && *s == pos.subcategory)
        })
        .unwrap_or(0);

    (0..slots.len())
        .map(|offset| slots[(start + offset) % slots.len()])
        .find_map(|(category, subcategory)| {
            let record = snapshot.subcategory(category, subcategory);
            let complete = record.is_some_and(|r| is_subcategory_complete(r, policy));
            (!complete).then(|| ResumeDecision::StartNewPattern {
                category: category.to_string(),
                subcategory: subcategory.to_string(),
                pattern_index: record.map_or(0, |r| r.patterns.len()),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::{Category, Position};

    fn catalog() -> Snapshot {
        let mut snapshot = Snapshot::default();
        let mut health = Category::new("Health");
        health.subcategories = vec!["Dental".into(), "Vision".into()];
        let mut travel = Category::new("Travel");
        travel.subcategories = vec!["Flights".into()];
        snapshot.categories = vec![health, travel];
        snapshot
    }

    const POLICY: SubcategoryPolicy = SubcategoryPolicy::FixedCount(1);

    #[test]
    fn fresh_catalog_starts_at_first_subcategory() {
        assert_eq!(
            plan(&catalog(), POLICY),
            ResumeDecision::StartNewPattern {
                category: "Health".into(),
                subcategory: "Dental".into(),
                pattern_index: 0,
            }
        );
        assert_eq!(plan(&Snapshot::default(), POLICY), ResumeDecision::AllComplete);
    }

    #[test]
    fn pending_work_wins_over_cursor() {
        let mut snapshot = catalog();
        let record = snapshot.ensure_subcategory_record("Health", "Vision");
        record
            .patterns
            .push(Pattern::new("pattern_1".into(), "vision".into(), ["u2", "u1"]));
        snapshot.current_position = Some(Position {
            category: "Travel".into(),
            subcategory: "Flights".into(),
            category_index: 1,
            subcategory_index: 0,
            pattern_key: None,
            updated_at: Utc::now(),
        });

        assert_eq!(
            plan(&snapshot, POLICY),
            ResumeDecision::ResumeDownloads {
                category: "Health".into(),
                subcategory: "Vision".into(),
                pattern_key: "pattern_1".into(),
                pending_urls: vec!["u1".into(), "u2".into()],
            }
        );
    }

    #[test]
    fn cursor_walk_wraps_and_skips_complete() {
        let mut snapshot = catalog();
        snapshot
            .ensure_subcategory_record("Travel", "Flights")
            .completed = true;
        let dental = snapshot.ensure_subcategory_record("Health", "Dental");
        dental.download_count = 1;
        dental
            .patterns
            .push(Pattern::new("pattern_1".into(), "dental".into(), Vec::<String>::new()));
        snapshot.current_position = Some(Position {
            category: "Travel".into(),
            subcategory: "Flights".into(),
            category_index: 1,
            subcategory_index: 0,
            pattern_key: None,
            updated_at: Utc::now(),
        });

        assert_eq!(
            plan(&snapshot, POLICY),
            ResumeDecision::StartNewPattern {
                category: "Health".into(),
                subcategory: "Vision".into(),
                pattern_index: 0,
            }
        );

        snapshot
            .ensure_subcategory_record("Health", "Vision")
            .completed = true;
        assert_eq!(plan(&snapshot, POLICY), ResumeDecision::AllComplete);
        assert_eq!(plan(&snapshot, POLICY).as_str(), "all_complete");
    }

    #[test]
    fn unreadable_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        assert_eq!(
            resume_from_disk(&path, POLICY).unwrap(),
            ResumeDecision::AllComplete
        );
        std::fs::write(&path, "not json").unwrap();
        assert!(resume_from_disk(&path, POLICY).is_err());
    }
}
