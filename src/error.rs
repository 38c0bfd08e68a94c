//! Error types shared by the checkpoint stores.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A record was rejected before it reached disk.
    #[error("Invalid record: {0}")]
    Validation(String),
    /// The caller named a category, subcategory or pattern the store does not know.
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },
    /// A write, rename or read of a checkpoint file failed.
    #[error("Failed to {action} {}: {source}", .path.display())]
    Persistence {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Advisory: the URL is already in the processed index.
    #[error("URL already processed: {0}")]
    Duplicate(String),
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    /// The snapshot exists but cannot be trusted as a resume source.
    #[error("Unusable snapshot {}: {reason}", .path.display())]
    Snapshot { path: PathBuf, reason: String },
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub(crate) fn write(path: &Path, source: io::Error) -> Self {
        Self::Persistence {
            action: "write",
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn read(path: &Path, source: io::Error) -> Self {
        Self::Persistence {
            action: "read",
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn rename(path: &Path, source: io::Error) -> Self {
        Self::Persistence {
            action: "rename",
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the error is the advisory duplicate signal rather than a failure.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A persisted record that was skipped or repaired while loading.
///
/// Issues never abort a load; they are handed back next to the loaded store
/// so the caller can report them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub source: PathBuf,
    /// 1-based line number for line-oriented files.
    pub line: Option<usize>,
    pub reason: String,
}

impl ValidationIssue {
    pub fn new(source: &Path, reason: impl Into<String>) -> Self {
        Self {
            source: source.to_path_buf(),
            line: None,
            reason: reason.into(),
        }
    }

    pub fn at_line(source: &Path, line: usize, reason: impl Into<String>) -> Self {
        Self {
            source: source.to_path_buf(),
            line: Some(line),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}", self.source.display(), line, self.reason),
            None => write!(f, "{}: {}", self.source.display(), self.reason),
        }
    }
}
