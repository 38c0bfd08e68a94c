//! Static category catalog supplied by configuration.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One configured category and its subcategories, in crawl order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    #[serde(default)]
    pub subcategories: Vec<String>,
}

impl CategorySpec {
    pub fn new<I, S>(name: impl Into<String>, subcategories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            subcategories: subcategories.into_iter().map(Into::into).collect(),
        }
    }
}

/// SHA-256 of the serialized catalog, used to notice catalog edits between runs.
pub fn catalog_hash(catalog: &[CategorySpec]) -> String {
    let json = serde_json::to_string(catalog).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    hex::encode(hasher.finalize())
}
