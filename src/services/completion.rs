//! Completion rules for patterns, subcategories and categories.
//!
//! Everything here is side-effect free. The hierarchy store applies the
//! results and persists any flags that flipped.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Category, CategoryPatterns, Pattern, SubcategoryRecord};

/// When a single pattern counts as done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternRule {
    /// No URLs left pending.
    #[default]
    PendingDrained,
    /// No URLs left pending, or at least this many downloads.
    PendingDrainedOrDownloads(u64),
}

impl fmt::Display for PatternRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingDrained => write!(f, "pending drained"),
            Self::PendingDrainedOrDownloads(n) => {
                write!(f, "pending drained or {} downloads", n)
            }
        }
    }
}

/// How many confirmed downloads a subcategory needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubcategoryPolicy {
    /// A fixed number of downloads.
    FixedCount(u64),
    /// Half of the distinct URLs discovered under the subcategory, rounded up,
    /// but never less than `min`.
    HalfOfDiscovered {
        #[serde(default)]
        min: u64,
    },
}

impl fmt::Display for SubcategoryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedCount(n) => write!(f, "{} downloads", n),
            Self::HalfOfDiscovered { min } => {
                write!(f, "half of discovered (min {})", min)
            }
        }
    }
}

/// The pair of rules a hierarchy store evaluates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRules {
    #[serde(default)]
    pub pattern: PatternRule,
    pub subcategory: SubcategoryPolicy,
}

impl CompletionRules {
    pub fn new(pattern: PatternRule, subcategory: SubcategoryPolicy) -> Self {
        Self {
            pattern,
            subcategory,
        }
    }
}

pub fn is_pattern_complete(pattern: &Pattern, rule: PatternRule) -> bool {
    let drained = !pattern.has_pending();
    match rule {
        PatternRule::PendingDrained => drained,
        PatternRule::PendingDrainedOrDownloads(n) => {
            drained || pattern.urls.downloaded().len() as u64 >= n
        }
    }
}

/// Downloads a subcategory needs before it is complete. Always at least one.
pub fn required_downloads(record: &SubcategoryRecord, policy: SubcategoryPolicy) -> u64 {
    match policy {
        SubcategoryPolicy::FixedCount(n) => n.max(1),
        SubcategoryPolicy::HalfOfDiscovered { min } => {
            let discovered = record.discovered_urls() as u64;
            discovered.div_ceil(2).max(min).max(1)
        }
    }
}

/// A completed subcategory stays completed.
pub fn is_subcategory_complete(record: &SubcategoryRecord, policy: SubcategoryPolicy) -> bool {
    record.completed || record.download_count >= required_downloads(record, policy)
}

/// Every known subcategory has a record and is complete.
///
/// Known subcategories are the catalog names plus any created lazily. A
/// category with none is not complete.
pub fn is_category_complete(
    category: &Category,
    records: Option<&CategoryPatterns>,
    policy: SubcategoryPolicy,
) -> bool {
    let mut known: Vec<&str> = category.subcategories.iter().map(String::as_str).collect();
    if let Some(bucket) = records {
        let listed: HashSet<&str> = known.iter().copied().collect();
        known.extend(
            bucket
                .subcategories
                .iter()
                .map(|s| s.name.as_str())
                .filter(|name| !listed.contains(name)),
        );
    }
    if known.is_empty() {
        return false;
    }
    let Some(bucket) = records else {
        return false;
    };
    known.iter().all(|name| {
        bucket
            .subcategory(name)
            .is_some_and(|record| is_subcategory_complete(record, policy))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(urls: &[&str]) -> Pattern {
        Pattern::new("pattern_1".into(), "dental insurance".into(), urls.iter().copied())
    }

    #[test]
    fn pattern_rules() {
        let mut p = pattern(&["u1", "u2", "u3"]);
        assert!(!is_pattern_complete(&p, PatternRule::PendingDrained));
        p.urls.mark_downloaded("u1");
        assert!(is_pattern_complete(
            &p,
            PatternRule::PendingDrainedOrDownloads(1)
        ));
        p.urls.mark_downloaded("u2");
        p.urls.mark_failed("u3");
        assert!(is_pattern_complete(&p, PatternRule::PendingDrained));

        assert!(is_pattern_complete(&pattern(&[]), PatternRule::PendingDrained));
    }

    #[test]
    fn required_downloads_never_zero() {
        let record = SubcategoryRecord::new("Dental");
        assert_eq!(required_downloads(&record, SubcategoryPolicy::FixedCount(0)), 1);
        assert_eq!(
            required_downloads(&record, SubcategoryPolicy::HalfOfDiscovered { min: 0 }),
            1
        );
    }

    #[test]
    fn half_of_discovered_rounds_up() {
        let mut record = SubcategoryRecord::new("Dental");
        record.patterns.push(Pattern::new(
            "pattern_1".into(),
            "a".into(),
            ["u1", "u2", "u3"],
        ));
        record
            .patterns
            .push(Pattern::new("pattern_2".into(), "b".into(), ["u3", "u4", "u5"]));
        let policy = SubcategoryPolicy::HalfOfDiscovered { min: 1 };
        assert_eq!(required_downloads(&record, policy), 3);
        assert_eq!(
            required_downloads(&record, SubcategoryPolicy::HalfOfDiscovered { min: 10 }),
            10
        );

        record.download_count = 2;
        assert!(!is_subcategory_complete(&record, policy));
        record.download_count = 3;
        assert!(is_subcategory_complete(&record, policy));
    }

    #[test]
    fn subcategory_flag_is_sticky() {
        let mut record = SubcategoryRecord::new("Dental");
        record.completed = true;
        assert!(is_subcategory_complete(
            &record,
            SubcategoryPolicy::FixedCount(100)
        ));
    }

    #[test]
    fn category_needs_every_known_subcategory() {
        let policy = SubcategoryPolicy::FixedCount(1);
        let mut category = Category::new("Health");
        assert!(!is_category_complete(&category, None, policy));

        category.subcategories = vec!["Dental".into(), "Vision".into()];
        let mut bucket = CategoryPatterns::new("Health");
        let mut dental = SubcategoryRecord::new("Dental");
        dental.download_count = 1;
        bucket.subcategories.push(dental);
        assert!(!is_category_complete(&category, Some(&bucket), policy));

        let mut vision = SubcategoryRecord::new("Vision");
        vision.download_count = 1;
        bucket.subcategories.push(vision);
        assert!(is_category_complete(&category, Some(&bucket), policy));

        bucket.subcategories.push(SubcategoryRecord::new("Hearing"));
        assert!(!is_category_complete(&category, Some(&bucket), policy));
    }

    #[test]
    fn rules_parse_from_config_values() {
        let rules: CompletionRules = serde_json::from_str(
            r#"{"pattern": {"pending_drained_or_downloads": 5}, "subcategory": {"half_of_discovered": {"min": 2}}}"#,
        )
        .unwrap();
        assert_eq!(rules.pattern, PatternRule::PendingDrainedOrDownloads(5));
        assert_eq!(
            rules.subcategory,
            SubcategoryPolicy::HalfOfDiscovered { min: 2 }
        );

        let rules: CompletionRules =
            serde_json::from_str(r#"{"subcategory": {"fixed_count": 10}}"#).unwrap();
        assert_eq!(rules.pattern, PatternRule::PendingDrained);
    }
}
