//! Pattern creation and outcome recording.

use chrono::Utc;
use tracing::{debug, info};

use super::{OutcomeEffect, WorkHierarchyStore};
use crate::error::{Result, StoreError};
use crate::models::{pattern_key, Pattern, PatternStatus};
use crate::services::completion;

impl WorkHierarchyStore {
    /// Start a new pattern under a subcategory and return its key.
    ///
    /// The category must be known. An unknown subcategory is created and
    /// appended to the category's list. A pattern with no URLs is complete as
    /// soon as it is created.
    pub fn init_pattern<I, S>(
        &mut self,
        category: &str,
        subcategory: &str,
        text: &str,
        urls: I,
    ) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if text.trim().is_empty() {
            return Err(StoreError::Validation("pattern text is empty".to_string()));
        }
        if subcategory.trim().is_empty() {
            return Err(StoreError::Validation("subcategory is empty".to_string()));
        }
        let cat_idx = self
            .snapshot
            .category_index(category)
            .ok_or_else(|| StoreError::not_found("category", category))?;

        let (key, added, effect) = self.transact(|store| {
            let added = store.snapshot.categories[cat_idx].ensure_subcategory(subcategory);

            let record = store.snapshot.ensure_subcategory_record(category, subcategory);
            let mut seq = record.next_pattern_seq.max(1);
            while record.pattern(&pattern_key(seq)).is_some() {
                seq += 1;
            }
            let key = pattern_key(seq);
            record.next_pattern_seq = seq + 1;
            record
                .patterns
                .push(Pattern::new(key.clone(), text.to_string(), urls));

            let effect = store.evaluate(category, subcategory, &key);
            store.set_position(category, subcategory, Some(&key));
            Ok((key, added, effect))
        })?;

        if added {
            info!("Added subcategory {}/{}", category, subcategory);
        }
        debug!(
            "Created {} for {}/{}: {:?}",
            key, category, subcategory, text
        );
        self.log_effect(category, subcategory, &key, &effect);
        Ok(key)
    }

    /// Record the result of one download attempt.
    ///
    /// Success moves the URL into `downloaded`; the subcategory download count
    /// and today's download count only grow when the URL was not downloaded
    /// before. Failure moves it into `failed`, except that a confirmed download
    /// stays downloaded. A URL the pattern has not seen yet joins it.
    pub fn record_outcome(
        &mut self,
        category: &str,
        subcategory: &str,
        key: &str,
        url: &str,
        success: bool,
    ) -> Result<OutcomeEffect> {
        if url.trim().is_empty() {
            return Err(StoreError::Validation("url is empty".to_string()));
        }
        if self.snapshot.category(category).is_none() {
            return Err(StoreError::not_found("category", category));
        }
        let pattern_known = self
            .snapshot
            .subcategory(category, subcategory)
            .ok_or_else(|| {
                StoreError::not_found("subcategory", format!("{}/{}", category, subcategory))
            })?
            .pattern(key)
            .is_some();
        if !pattern_known {
            return Err(StoreError::not_found(
                "pattern",
                format!("{}/{}/{}", category, subcategory, key),
            ));
        }

        let effect = self.transact(|store| {
            let now = Utc::now();
            let Some(record) = store.snapshot.subcategory_mut(category, subcategory) else {
                return Err(StoreError::not_found(
                    "subcategory",
                    format!("{}/{}", category, subcategory),
                ));
            };
            let Some(pattern) = record.pattern_mut(key) else {
                return Err(StoreError::not_found(
                    "pattern",
                    format!("{}/{}/{}", category, subcategory, key),
                ));
            };

            let newly_downloaded = success && pattern.urls.mark_downloaded(url);
            let changed = if success {
                newly_downloaded
            } else {
                pattern.urls.mark_failed(url)
            };
            if changed {
                pattern.updated_at = now;
            }
            if newly_downloaded {
                record.download_count += 1;
                *store
                    .snapshot
                    .daily_downloads
                    .entry(now.date_naive())
                    .or_default() += 1;
            }

            let mut effect = store.evaluate(category, subcategory, key);
            effect.newly_downloaded = newly_downloaded;
            store.set_position(category, subcategory, Some(key));
            Ok(effect)
        })?;

        self.log_effect(category, subcategory, key, &effect);
        Ok(effect)
    }

    /// Re-check pattern, subcategory and category completion after a change.
    fn evaluate(&mut self, category: &str, subcategory: &str, key: &str) -> OutcomeEffect {
        let rules = self.rules;
        let mut effect = OutcomeEffect::default();

        if let Some(record) = self.snapshot.subcategory_mut(category, subcategory) {
            if let Some(pattern) = record.pattern_mut(key) {
                if !pattern.is_completed()
                    && completion::is_pattern_complete(pattern, rules.pattern)
                {
                    pattern.status = PatternStatus::Completed;
                    pattern.updated_at = Utc::now();
                    effect.pattern_completed = true;
                }
            }
            if !record.completed
                && completion::is_subcategory_complete(record, rules.subcategory)
            {
                record.completed = true;
                effect.subcategory_completed = true;
            }
        }

        if let Some(idx) = self.snapshot.category_index(category) {
            let records = self
                .snapshot
                .pattern_data
                .iter()
                .find(|c| c.name == category);
            let entry = &mut self.snapshot.categories[idx];
            if !entry.completed
                && completion::is_category_complete(entry, records, rules.subcategory)
            {
                entry.completed = true;
                effect.category_completed = true;
            }
        }

        effect
    }

    fn log_effect(&self, category: &str, subcategory: &str, key: &str, effect: &OutcomeEffect) {
        if effect.pattern_completed {
            info!("Pattern {}/{}/{} completed", category, subcategory, key);
        }
        if effect.subcategory_completed {
            info!("Subcategory {}/{} completed", category, subcategory);
        }
        if effect.category_completed {
            info!("Category {} completed", category);
        }
    }
}
