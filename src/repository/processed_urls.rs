//! Append-only index of successfully processed URLs.
//!
//! Each record is one line, `category|subcategory|url`. Records are only ever
//! appended and flushed before the in-memory index is updated, so everything
//! the index reports as processed is on disk.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError, ValidationIssue};
use crate::utils::DomainFilter;

const FIELD_SEPARATOR: char = '|';

/// URL counts for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UrlCounts {
    pub total: usize,
    pub by_subcategory: BTreeMap<String, usize>,
}

/// Counts across the whole index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessedUrlStats {
    pub total_urls: usize,
    pub categories: BTreeMap<String, UrlCounts>,
}

/// Persisted set of processed URLs, partitioned by category and subcategory.
#[derive(Debug)]
pub struct ProcessedUrlIndex {
    path: PathBuf,
    filter: DomainFilter,
    urls: HashSet<String>,
    buckets: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
    /// The log ends in a partial line that the next append must terminate.
    needs_newline: bool,
}

impl ProcessedUrlIndex {
    /// Load the index from `path`.
    ///
    /// Malformed lines are skipped and returned as issues. A missing file is an
    /// empty index. Fails only if the file exists and cannot be read.
    pub fn load(
        path: impl AsRef<Path>,
        filter: DomainFilter,
    ) -> Result<(Self, Vec<ValidationIssue>)> {
        let path = path.as_ref().to_path_buf();
        let mut index = Self {
            path,
            filter,
            urls: HashSet::new(),
            buckets: BTreeMap::new(),
            needs_newline: false,
        };

        let bytes = match fs::read(&index.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No processed URL log at {}", index.path.display());
                return Ok((index, Vec::new()));
            }
            Err(e) => return Err(StoreError::read(&index.path, e)),
        };
        index.needs_newline = bytes.last().is_some_and(|b| *b != b'\n');

        let mut issues = Vec::new();
        for (idx, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            let line_no = idx + 1;
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            if raw.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }
            let Ok(line) = std::str::from_utf8(raw) else {
                issues.push(ValidationIssue::at_line(
                    &index.path,
                    line_no,
                    "line is not valid UTF-8",
                ));
                continue;
            };
            match index.parse_line(line) {
                Ok((category, subcategory, url)) => {
                    index.insert(category, subcategory, url);
                }
                Err(reason) => {
                    issues.push(ValidationIssue::at_line(&index.path, line_no, reason));
                }
            }
        }

        for issue in &issues {
            warn!("Skipped processed URL record: {}", issue);
        }
        info!(
            "Loaded {} processed URLs from {}",
            index.urls.len(),
            index.path.display()
        );
        Ok((index, issues))
    }

    fn parse_line<'a>(
        &self,
        line: &'a str,
    ) -> std::result::Result<(&'a str, &'a str, &'a str), String> {
        let fields: Vec<&'a str> = line.split(FIELD_SEPARATOR).collect();
        let [category, subcategory, url] = fields[..] else {
            return Err(format!("expected 3 fields, found {}", fields.len()));
        };
        let (category, subcategory, url) = (category.trim(), subcategory.trim(), url.trim());
        if category.is_empty() || subcategory.is_empty() || url.is_empty() {
            return Err("empty field".to_string());
        }
        self.filter
            .check(url)
            .map_err(|reason| format!("{}: {}", reason, url))?;
        Ok((category, subcategory, url))
    }

    fn insert(&mut self, category: &str, subcategory: &str, url: &str) -> bool {
        if !self.urls.insert(url.to_string()) {
            return false;
        }
        self.buckets
            .entry(category.to_string())
            .or_default()
            .entry(subcategory.to_string())
            .or_default()
            .insert(url.to_string());
        true
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Surrounding whitespace is ignored, matching how [`add`](Self::add)
    /// stores URLs.
    pub fn is_processed(&self, url: &str) -> bool {
        self.urls.contains(url.trim())
    }

    /// Record a processed URL.
    ///
    /// The record is appended and synced before the in-memory index changes.
    /// An already-present URL is reported as [`StoreError::Duplicate`] and
    /// nothing is written.
    pub fn add(&mut self, category: &str, subcategory: &str, url: &str) -> Result<()> {
        for (name, value) in [
            ("category", category),
            ("subcategory", subcategory),
            ("url", url),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::Validation(format!("{} is empty", name)));
            }
            if value.contains([FIELD_SEPARATOR, '\r', '\n']) {
                return Err(StoreError::Validation(format!(
                    "{} contains a reserved character: {:?}",
                    name, value
                )));
            }
        }
        let (category, subcategory, url) = (category.trim(), subcategory.trim(), url.trim());
        self.filter
            .check(url)
            .map_err(|reason| StoreError::Validation(format!("{}: {}", reason, url)))?;

        if self.is_processed(url) {
            return Err(StoreError::Duplicate(url.to_string()));
        }

        let mut record = String::new();
        if self.needs_newline {
            record.push('\n');
        }
        record.push_str(&format!(
            "{}{sep}{}{sep}{}\n",
            category,
            subcategory,
            url,
            sep = FIELD_SEPARATOR
        ));
        self.append(record.as_bytes())?;
        self.needs_newline = false;

        self.insert(category, subcategory, url);
        debug!("Recorded processed URL {} under {}/{}", url, category, subcategory);
        Ok(())
    }

    fn append(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::write(parent, e))?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::write(&self.path, e))?;
        file.write_all(bytes)
            .map_err(|e| StoreError::write(&self.path, e))?;
        file.sync_data()
            .map_err(|e| StoreError::write(&self.path, e))?;
        Ok(())
    }

    /// Counts for a category, optionally narrowed to one subcategory.
    pub fn stats_by_category(&self, category: &str, subcategory: Option<&str>) -> UrlCounts {
        let Some(subs) = self.buckets.get(category) else {
            return UrlCounts::default();
        };
        let by_subcategory: BTreeMap<String, usize> = subs
            .iter()
            .filter(|(name, _)| subcategory.map_or(true, |s| s == name.as_str()))
            .map(|(name, urls)| (name.clone(), urls.len()))
            .collect();
        UrlCounts {
            total: by_subcategory.values().sum(),
            by_subcategory,
        }
    }

    /// URLs recorded for a category, optionally narrowed to one subcategory.
    pub fn category_urls(&self, category: &str, subcategory: Option<&str>) -> BTreeSet<String> {
        let Some(subs) = self.buckets.get(category) else {
            return BTreeSet::new();
        };
        subs.iter()
            .filter(|(name, _)| subcategory.map_or(true, |s| s == name.as_str()))
            .flat_map(|(_, urls)| urls.iter().cloned())
            .collect()
    }

    pub fn stats(&self) -> ProcessedUrlStats {
        ProcessedUrlStats {
            total_urls: self.urls.len(),
            categories: self
                .buckets
                .keys()
                .map(|name| (name.clone(), self.stats_by_category(name, None)))
                .collect(),
        }
    }
}
