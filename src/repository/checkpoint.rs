//! Durable snapshot persistence.
//!
//! Snapshots are written to a temp file in the target directory, synced and
//! renamed over the previous copy, so a crash at any point leaves either the
//! old or the new snapshot on disk. Loading heals structural damage and
//! reports what it changed.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Result, StoreError, ValidationIssue};
use crate::models::{Category, Snapshot, Statistics, SCHEMA_VERSION};

/// Replace `path` with `bytes` atomically.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| StoreError::write(dir, e))?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| StoreError::write(dir, e))?;
    temp.write_all(bytes)
        .map_err(|e| StoreError::write(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| StoreError::write(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| StoreError::rename(path, e.error))?;
    Ok(())
}

/// Serialize and atomically write a snapshot.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    write_atomic(path, &bytes)?;
    debug!("Wrote snapshot {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Strict read: a missing file is `None`, anything unusable is an error.
///
/// Structural healing is still applied so callers see the same view as a
/// lenient load.
pub fn read_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    Ok(inspect_snapshot(path)?.map(|(snapshot, _)| snapshot))
}

/// Strict read that also reports what healing repaired. Never writes.
pub fn inspect_snapshot(path: &Path) -> Result<Option<(Snapshot, Vec<ValidationIssue>)>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::read(path, e)),
    };
    let mut snapshot = parse(&bytes).map_err(|reason| StoreError::Snapshot {
        path: path.to_path_buf(),
        reason,
    })?;
    let issues = heal(&mut snapshot)
        .into_iter()
        .map(|reason| ValidationIssue::new(path, reason))
        .collect();
    Ok(Some((snapshot, issues)))
}

/// Lenient load used when opening a store.
///
/// A missing file yields a fresh snapshot. A file that cannot be parsed, or
/// that was written by a newer schema, is moved aside to
/// `<name>.corrupt-<timestamp>` and replaced by a fresh snapshot. Only a file
/// that exists but cannot be read, or cannot be moved aside, is an error.
pub fn load_snapshot(path: &Path) -> Result<(Snapshot, Vec<ValidationIssue>)> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No snapshot at {}, starting fresh", path.display());
            return Ok((Snapshot::default(), Vec::new()));
        }
        Err(e) => return Err(StoreError::read(path, e)),
    };

    let mut snapshot = match parse(&bytes) {
        Ok(snapshot) => snapshot,
        Err(reason) => {
            let moved = quarantine(path)?;
            warn!(
                "Snapshot {} unusable ({}), moved to {}",
                path.display(),
                reason,
                moved.display()
            );
            let issue = ValidationIssue::new(
                path,
                format!("{}; moved to {}", reason, moved.display()),
            );
            return Ok((Snapshot::default(), vec![issue]));
        }
    };

    let issues: Vec<ValidationIssue> = heal(&mut snapshot)
        .into_iter()
        .map(|reason| ValidationIssue::new(path, reason))
        .collect();
    for issue in &issues {
        warn!("{}", issue);
    }
    Ok((snapshot, issues))
}

fn parse(bytes: &[u8]) -> std::result::Result<Snapshot, String> {
    let snapshot: Snapshot =
        serde_json::from_slice(bytes).map_err(|e| format!("invalid snapshot JSON: {}", e))?;
    if snapshot.schema_version > SCHEMA_VERSION {
        return Err(format!(
            "schema version {} is newer than supported version {}",
            snapshot.schema_version, SCHEMA_VERSION
        ));
    }
    Ok(snapshot)
}

fn quarantine(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    let target = path.with_file_name(format!(
        "{}.corrupt-{}",
        name,
        Utc::now().format("%Y%m%dT%H%M%S%.3f")
    ));
    fs::rename(path, &target).map_err(|e| StoreError::rename(path, e))?;
    Ok(target)
}

/// Repair structural damage in place. Returns one message per repair.
pub(crate) fn heal(snapshot: &mut Snapshot) -> Vec<String> {
    let mut fixes = Vec::new();

    if snapshot.schema_version < SCHEMA_VERSION {
        snapshot.schema_version = SCHEMA_VERSION;
    }

    let mut seen = HashSet::new();
    snapshot.categories.retain(|c| {
        let first = seen.insert(c.name.clone());
        if !first {
            fixes.push(format!("dropped duplicate category '{}'", c.name));
        }
        first
    });
    for category in &mut snapshot.categories {
        let mut seen = HashSet::new();
        let before = category.subcategories.len();
        category.subcategories.retain(|s| seen.insert(s.clone()));
        if category.subcategories.len() != before {
            fixes.push(format!(
                "dropped duplicate subcategory names in '{}'",
                category.name
            ));
        }
    }

    let mut seen = HashSet::new();
    snapshot.pattern_data.retain(|c| {
        let first = seen.insert(c.name.clone());
        if !first {
            fixes.push(format!("dropped duplicate pattern data for '{}'", c.name));
        }
        first
    });

    for bucket in &mut snapshot.pattern_data {
        let mut seen = HashSet::new();
        bucket.subcategories.retain(|s| {
            let first = seen.insert(s.name.clone());
            if !first {
                fixes.push(format!(
                    "dropped duplicate record for {}/{}",
                    bucket.name, s.name
                ));
            }
            first
        });

        for record in &mut bucket.subcategories {
            let where_ = format!("{}/{}", bucket.name, record.name);

            let mut seen = HashSet::new();
            record.patterns.retain(|p| {
                let first = seen.insert(p.key.clone());
                if !first {
                    fixes.push(format!("dropped duplicate pattern {} in {}", p.key, where_));
                }
                first
            });

            for pattern in &mut record.patterns {
                let moved = pattern.urls.repartition();
                if moved > 0 {
                    fixes.push(format!(
                        "{} in {}: {} URL(s) were in more than one set",
                        pattern.key, where_, moved
                    ));
                }
            }

            let highest = record.patterns.iter().filter_map(|p| p.seq()).max();
            if let Some(highest) = highest {
                if record.next_pattern_seq <= highest {
                    fixes.push(format!(
                        "next pattern number in {} raised from {} to {}",
                        where_,
                        record.next_pattern_seq,
                        highest + 1
                    ));
                    record.next_pattern_seq = highest + 1;
                }
            }
            if record.next_pattern_seq == 0 {
                record.next_pattern_seq = 1;
            }

            let recorded = record.downloaded_urls();
            if record.download_count < recorded {
                fixes.push(format!(
                    "download count in {} raised from {} to {}",
                    where_, record.download_count, recorded
                ));
                record.download_count = recorded;
            }
        }
    }

    // Every record must be reachable from the category list.
    for bucket in &snapshot.pattern_data {
        let idx = match snapshot.categories.iter().position(|c| c.name == bucket.name) {
            Some(idx) => idx,
            None => {
                fixes.push(format!("restored missing category '{}'", bucket.name));
                snapshot.categories.push(Category::new(bucket.name.clone()));
                snapshot.categories.len() - 1
            }
        };
        let category = &mut snapshot.categories[idx];
        for record in &bucket.subcategories {
            if category.ensure_subcategory(&record.name) {
                fixes.push(format!(
                    "restored missing subcategory '{}' in '{}'",
                    record.name, category.name
                ));
            }
        }
    }

    if let Some(position) = snapshot.current_position.as_mut() {
        let located = snapshot
            .categories
            .iter()
            .position(|c| c.name == position.category)
            .and_then(|ci| {
                snapshot.categories[ci]
                    .subcategory_index(&position.subcategory)
                    .map(|si| (ci, si))
            });
        match located {
            Some((ci, si)) => {
                if (position.category_index, position.subcategory_index) != (ci, si) {
                    fixes.push(format!(
                        "cursor indices for {}/{} corrected",
                        position.category, position.subcategory
                    ));
                    position.category_index = ci;
                    position.subcategory_index = si;
                }
                let pattern_known = position.pattern_key.as_deref().map_or(true, |key| {
                    snapshot
                        .pattern_data
                        .iter()
                        .find(|c| c.name == position.category)
                        .and_then(|c| c.subcategory(&position.subcategory))
                        .is_some_and(|r| r.pattern(key).is_some())
                });
                if !pattern_known {
                    fixes.push(format!(
                        "cursor pattern in {}/{} is unknown, cleared",
                        position.category, position.subcategory
                    ));
                    position.pattern_key = None;
                }
            }
            None => {
                fixes.push(format!(
                    "cursor names unknown {}/{}, dropped",
                    position.category, position.subcategory
                ));
                snapshot.current_position = None;
            }
        }
    }

    snapshot.statistics = Statistics::compute(snapshot);
    fixes
}

/// Quarantined copies sitting next to `path`.
pub fn quarantined_files(path: &Path) -> Vec<PathBuf> {
    let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
        return Vec::new();
    };
    let prefix = format!("{}.corrupt-", name.to_string_lossy());
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with(&prefix))
        })
        .collect();
    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pattern, Position};
    use tempfile::tempdir;

    #[test]
    fn atomic_write_replaces_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
        let count = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn missing_file_is_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let (snapshot, issues) = load_snapshot(&path).unwrap();
        assert!(snapshot.categories.is_empty());
        assert!(issues.is_empty());
        assert!(read_snapshot(&path).unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{\"categories\": [").unwrap();

        assert!(matches!(
            read_snapshot(&path),
            Err(StoreError::Snapshot { .. })
        ));

        let (snapshot, issues) = load_snapshot(&path).unwrap();
        assert!(snapshot.categories.is_empty());
        assert_eq!(issues.len(), 1);
        assert!(!path.exists());
        assert_eq!(quarantined_files(&path).len(), 1);
    }

    #[test]
    fn newer_schema_is_not_trusted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, br#"{"schema_version": 99}"#).unwrap();
        assert!(read_snapshot(&path).is_err());
        let (_, issues) = load_snapshot(&path).unwrap();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].reason.contains("newer"));
    }

    #[test]
    fn save_then_load_is_clean() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut snapshot = Snapshot::default();
        let mut health = Category::new("Health");
        health.subcategories.push("Dental".into());
        snapshot.categories.push(health);
        let record = snapshot.ensure_subcategory_record("Health", "Dental");
        record
            .patterns
            .push(Pattern::new("pattern_1".into(), "dental".into(), ["u1"]));
        record.next_pattern_seq = 2;
        save_snapshot(&path, &snapshot).unwrap();

        let (loaded, issues) = load_snapshot(&path).unwrap();
        assert!(issues.is_empty(), "{:?}", issues);
        assert_eq!(loaded.subcategory("Health", "Dental").unwrap().patterns.len(), 1);
    }

    #[test]
    fn heal_repairs_structure() {
        let json = r#"{
            "schema_version": 1,
            "categories": [
                {"name": "Health", "subcategories": ["Dental", "Dental"]},
                {"name": "Health", "subcategories": []}
            ],
            "pattern_data": {
                "Health": {
                    "Dental": {
                        "next_pattern_seq": 1,
                        "patterns": {
                            "pattern_3": {
                                "text": "dental",
                                "urls": {"pending": ["a", "b"], "downloaded": ["a"], "failed": []},
                                "created_at": "2024-01-01T00:00:00Z",
                                "updated_at": "2024-01-01T00:00:00Z"
                            }
                        }
                    }
                },
                "Travel": {"Flights": {}}
            },
            "current_position": {
                "category": "Nowhere", "subcategory": "x",
                "category_index": 0, "subcategory_index": 0,
                "updated_at": "2024-01-01T00:00:00Z"
            }
        }"#;
        let mut snapshot: Snapshot = serde_json::from_str(json).unwrap();
        let fixes = heal(&mut snapshot);

        assert_eq!(snapshot.categories.len(), 2);
        assert_eq!(snapshot.categories[0].subcategories, vec!["Dental"]);
        assert_eq!(snapshot.categories[1].name, "Travel");
        assert_eq!(snapshot.categories[1].subcategories, vec!["Flights"]);

        let record = snapshot.subcategory("Health", "Dental").unwrap();
        assert_eq!(record.next_pattern_seq, 4);
        assert_eq!(record.download_count, 1);
        let pattern = record.pattern("pattern_3").unwrap();
        assert_eq!(pattern.urls.pending().len(), 1);

        assert!(snapshot.current_position.is_none());
        assert!(fixes.len() >= 6, "{:?}", fixes);
        assert_eq!(heal(&mut snapshot), Vec::<String>::new());
    }

    #[test]
    fn heal_corrects_cursor_indices() {
        let mut snapshot = Snapshot::default();
        let mut health = Category::new("Health");
        health.subcategories = vec!["Dental".into(), "Vision".into()];
        snapshot.categories.push(health);
        snapshot.current_position = Some(Position {
            category: "Health".into(),
            subcategory: "Vision".into(),
            category_index: 3,
            subcategory_index: 0,
            pattern_key: None,
            updated_at: Utc::now(),
        });
        let fixes = heal(&mut snapshot);
        assert_eq!(fixes.len(), 1);
        let position = snapshot.current_position.unwrap();
        assert_eq!((position.category_index, position.subcategory_index), (0, 1));
    }
}
