//! Search pattern records and their URL lifecycle sets.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ordered::Keyed;

const PATTERN_KEY_PREFIX: &str = "pattern_";

/// Key for the `seq`-th pattern of a subcategory (`pattern_1`, `pattern_2`, ...).
pub fn pattern_key(seq: u32) -> String {
    format!("{}{}", PATTERN_KEY_PREFIX, seq)
}

/// Sequence number encoded in a pattern key, if it is one we generated.
pub fn pattern_seq(key: &str) -> Option<u32> {
    key.strip_prefix(PATTERN_KEY_PREFIX)?.parse().ok()
}

/// Pattern status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternStatus {
    #[default]
    InProgress,
    Completed,
}

impl PatternStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// The three disjoint URL sets of a pattern.
///
/// A URL lives in exactly one set. The only mutations are moves between sets,
/// so the union never loses a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlSets {
    #[serde(default)]
    pending: BTreeSet<String>,
    #[serde(default)]
    downloaded: BTreeSet<String>,
    #[serde(default)]
    failed: BTreeSet<String>,
}

impl UrlSets {
    pub fn with_pending<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pending: urls.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn pending(&self) -> &BTreeSet<String> {
        &self.pending
    }

    pub fn downloaded(&self) -> &BTreeSet<String> {
        &self.downloaded
    }

    pub fn failed(&self) -> &BTreeSet<String> {
        &self.failed
    }

    pub fn contains(&self, url: &str) -> bool {
        self.pending.contains(url) || self.downloaded.contains(url) || self.failed.contains(url)
    }

    /// Every URL ever recorded for the pattern.
    pub fn discovered(&self) -> impl Iterator<Item = &String> {
        self.pending
            .iter()
            .chain(self.downloaded.iter())
            .chain(self.failed.iter())
    }

    pub fn total(&self) -> usize {
        self.pending.len() + self.downloaded.len() + self.failed.len()
    }

    /// Move `url` into `downloaded`. Returns true if it was not downloaded before.
    pub(crate) fn mark_downloaded(&mut self, url: &str) -> bool {
        self.pending.remove(url);
        self.failed.remove(url);
        self.downloaded.insert(url.to_string())
    }

    /// Move `url` into `failed`. A confirmed download is never demoted.
    /// Returns true if the sets changed.
    pub(crate) fn mark_failed(&mut self, url: &str) -> bool {
        if self.downloaded.contains(url) {
            return false;
        }
        let was_pending = self.pending.remove(url);
        let newly_failed = self.failed.insert(url.to_string());
        was_pending || newly_failed
    }

    /// Restore disjointness after loading hand-edited or damaged data.
    /// Precedence is downloaded, then failed, then pending.
    /// Returns the number of URLs that were in more than one set.
    pub(crate) fn repartition(&mut self) -> usize {
        let mut fixed = 0;
        for url in &self.downloaded {
            if self.failed.remove(url) {
                fixed += 1;
            }
            if self.pending.remove(url) {
                fixed += 1;
            }
        }
        for url in &self.failed {
            if self.pending.remove(url) {
                fixed += 1;
            }
        }
        fixed
    }
}

/// A single search attempt within a subcategory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    /// Stored as the object key in the snapshot.
    #[serde(skip)]
    pub key: String,
    pub text: String,
    #[serde(default)]
    pub status: PatternStatus,
    #[serde(default)]
    pub urls: UrlSets,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Keyed for Pattern {
    fn key(&self) -> &str {
        &self.key
    }

    fn set_key(&mut self, key: String) {
        self.key = key;
    }
}

impl Pattern {
    pub(crate) fn new<I, S>(key: String, text: String, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Utc::now();
        Self {
            key,
            text,
            status: PatternStatus::InProgress,
            urls: UrlSets::with_pending(urls),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn seq(&self) -> Option<u32> {
        pattern_seq(&self.key)
    }

    pub fn is_completed(&self) -> bool {
        self.status == PatternStatus::Completed
    }

    pub fn has_pending(&self) -> bool {
        !self.urls.pending().is_empty()
    }
}

/// Read-only copy of a pattern handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternView {
    pub category: String,
    pub subcategory: String,
    pub key: String,
    pub text: String,
    pub status: PatternStatus,
    pub pending: Vec<String>,
    pub downloaded: Vec<String>,
    pub failed: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PatternView {
    pub fn new(category: &str, subcategory: &str, pattern: &Pattern) -> Self {
        Self {
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            key: pattern.key.clone(),
            text: pattern.text.clone(),
            status: pattern.status,
            pending: pattern.urls.pending().iter().cloned().collect(),
            downloaded: pattern.urls.downloaded().iter().cloned().collect(),
            failed: pattern.urls.failed().iter().cloned().collect(),
            created_at: pattern.created_at,
            updated_at: pattern.updated_at,
        }
    }

    pub fn discovered_count(&self) -> usize {
        self.pending.len() + self.downloaded.len() + self.failed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_roundtrip() {
        assert_eq!(pattern_key(7), "pattern_7");
        assert_eq!(pattern_seq("pattern_12"), Some(12));
        assert_eq!(pattern_seq("pattern_x"), None);
        assert_eq!(pattern_seq("dental"), None);
    }

    #[test]
    fn status_strings() {
        assert_eq!(PatternStatus::InProgress.as_str(), "in_progress");
        assert_eq!(
            PatternStatus::from_str("completed"),
            Some(PatternStatus::Completed)
        );
        assert_eq!(PatternStatus::from_str("done"), None);
    }

    #[test]
    fn download_moves_between_sets() {
        let mut urls = UrlSets::with_pending(["u1", "u2"]);
        assert!(urls.mark_failed("u1"));
        assert!(urls.failed().contains("u1"));
        assert!(!urls.pending().contains("u1"));

        assert!(urls.mark_downloaded("u1"));
        assert!(urls.downloaded().contains("u1"));
        assert!(!urls.failed().contains("u1"));
        assert!(!urls.mark_downloaded("u1"));
        assert_eq!(urls.total(), 2);
    }

    #[test]
    fn failure_is_idempotent_and_never_demotes() {
        let mut urls = UrlSets::with_pending(["u1", "u2"]);
        assert!(urls.mark_failed("u2"));
        assert!(!urls.mark_failed("u2"));
        assert_eq!(urls.failed().len(), 1);

        urls.mark_downloaded("u1");
        assert!(!urls.mark_failed("u1"));
        assert!(urls.downloaded().contains("u1"));
        assert!(!urls.failed().contains("u1"));
    }

    #[test]
    fn repartition_prefers_downloaded() {
        let json = r#"{"pending": ["a", "b", "c"], "downloaded": ["a"], "failed": ["a", "b"]}"#;
        let mut urls: UrlSets = serde_json::from_str(json).unwrap();
        assert_eq!(urls.repartition(), 3);
        assert_eq!(urls.downloaded().len(), 1);
        assert_eq!(urls.failed().iter().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(urls.pending().iter().collect::<Vec<_>>(), vec!["c"]);
    }
}
