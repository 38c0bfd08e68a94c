//! Search-text normalization.

use std::sync::LazyLock;

use regex::Regex;

/// Unicode punctuation and symbols.
static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\p{P}\p{S}]").unwrap());

/// Whitespace runs of any kind.
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Normalize search text for comparison.
///
/// Punctuation and symbols are removed, whitespace runs collapse to a single
/// space, and the result is trimmed and lowercased.
pub fn normalize_pattern(text: &str) -> String {
    let stripped = PUNCTUATION.replace_all(text, "");
    let collapsed = WHITESPACE.replace_all(&stripped, " ");
    collapsed.trim().to_lowercase()
}
