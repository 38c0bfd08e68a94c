//! Cursor, search counters and resume planning.

use tracing::debug;

use super::WorkHierarchyStore;
use crate::error::{Result, StoreError};
use crate::services::resume::{self, ResumeDecision};

impl WorkHierarchyStore {
    /// Move the cursor to a catalog subcategory.
    pub fn update_position(&mut self, category: &str, subcategory: &str) -> Result<()> {
        let entry = self
            .snapshot
            .category(category)
            .ok_or_else(|| StoreError::not_found("category", category))?;
        if entry.subcategory_index(subcategory).is_none() {
            return Err(StoreError::not_found(
                "subcategory",
                format!("{}/{}", category, subcategory),
            ));
        }
        self.transact(|store| {
            store.set_position(category, subcategory, None);
            Ok(())
        })?;
        debug!("Cursor moved to {}/{}", category, subcategory);
        Ok(())
    }

    /// Count one search attempt.
    pub fn record_search(&mut self, success: bool) -> Result<()> {
        self.transact(|store| {
            let counters = &mut store.snapshot.searches;
            if success {
                counters.successful += 1;
            } else {
                counters.failed += 1;
            }
            Ok(())
        })
    }

    /// Where the next run should pick up, planned from the snapshot on disk.
    pub fn resume_point(&self) -> Result<ResumeDecision> {
        resume::resume_from_disk(&self.path, self.rules.subcategory)
    }
}
