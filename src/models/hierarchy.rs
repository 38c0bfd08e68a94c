//! Category and subcategory records of the work hierarchy.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ordered::{self, Keyed};
use super::pattern::Pattern;

/// A top-level category and the ordered names of its subcategories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub subcategories: Vec<String>,
    #[serde(default)]
    pub completed: bool,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subcategories: Vec::new(),
            completed: false,
        }
    }

    pub fn subcategory_index(&self, name: &str) -> Option<usize> {
        self.subcategories.iter().position(|s| s == name)
    }

    /// Append a subcategory name if missing. Returns true if it was added.
    pub(crate) fn ensure_subcategory(&mut self, name: &str) -> bool {
        if self.subcategory_index(name).is_some() {
            return false;
        }
        self.subcategories.push(name.to_string());
        true
    }
}

/// Work recorded against one subcategory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubcategoryRecord {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub completed: bool,
    /// Confirmed downloads; one per URL newly moved into a pattern's downloaded set.
    #[serde(default)]
    pub download_count: u64,
    #[serde(default = "first_seq")]
    pub next_pattern_seq: u32,
    #[serde(default, with = "ordered")]
    pub patterns: Vec<Pattern>,
}

fn first_seq() -> u32 {
    1
}

impl Keyed for SubcategoryRecord {
    fn key(&self) -> &str {
        &self.name
    }

    fn set_key(&mut self, key: String) {
        self.name = key;
    }
}

impl SubcategoryRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            completed: false,
            download_count: 0,
            next_pattern_seq: first_seq(),
            patterns: Vec::new(),
        }
    }

    pub fn pattern(&self, key: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.key == key)
    }

    pub(crate) fn pattern_mut(&mut self, key: &str) -> Option<&mut Pattern> {
        self.patterns.iter_mut().find(|p| p.key == key)
    }

    /// Resolve a pattern by key, falling back to its exact text.
    pub fn find_pattern(&self, key_or_text: &str) -> Option<&Pattern> {
        self.pattern(key_or_text)
            .or_else(|| self.patterns.iter().find(|p| p.text == key_or_text))
    }

    /// Distinct URLs discovered across all patterns of the subcategory.
    pub fn discovered_urls(&self) -> usize {
        self.patterns
            .iter()
            .flat_map(|p| p.urls.discovered())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Downloads implied by the patterns' URL sets.
    pub fn downloaded_urls(&self) -> u64 {
        self.patterns
            .iter()
            .map(|p| p.urls.downloaded().len() as u64)
            .sum()
    }
}

/// Subcategory records of one category, keyed by subcategory name.
#[derive(Debug, Clone, Default)]
pub struct CategoryPatterns {
    pub name: String,
    pub subcategories: Vec<SubcategoryRecord>,
}

impl Keyed for CategoryPatterns {
    fn key(&self) -> &str {
        &self.name
    }

    fn set_key(&mut self, key: String) {
        self.name = key;
    }
}

impl CategoryPatterns {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subcategories: Vec::new(),
        }
    }

    pub fn subcategory(&self, name: &str) -> Option<&SubcategoryRecord> {
        self.subcategories.iter().find(|s| s.name == name)
    }

    pub(crate) fn subcategory_mut(&mut self, name: &str) -> Option<&mut SubcategoryRecord> {
        self.subcategories.iter_mut().find(|s| s.name == name)
    }
}

impl Serialize for CategoryPatterns {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ordered::serialize(&self.subcategories, serializer)
    }
}

impl<'de> Deserialize<'de> for CategoryPatterns {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self {
            name: String::new(),
            subcategories: ordered::deserialize(deserializer)?,
        })
    }
}
