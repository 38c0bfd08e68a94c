//! Shared helper functions for CLI commands.

use console::style;

use crawlstate::config::Settings;
use crawlstate::models::Snapshot;
use crawlstate::repository::{checkpoint, ProcessedUrlIndex};
use crawlstate::services::SubcategoryPolicy;
use crawlstate::ValidationIssue;

/// Read the snapshot without modifying anything on disk.
///
/// A missing snapshot is shown as an empty hierarchy.
pub fn read_snapshot(settings: &Settings) -> anyhow::Result<Snapshot> {
    Ok(checkpoint::read_snapshot(&settings.snapshot_path())?.unwrap_or_default())
}

/// Load the processed URL index, printing any skipped records.
pub fn load_url_index(settings: &Settings) -> anyhow::Result<ProcessedUrlIndex> {
    let (index, issues) = ProcessedUrlIndex::load(settings.url_log_path(), settings.domain_filter())?;
    print_issues(&issues);
    Ok(index)
}

/// Subcategory policy for read-only reports.
///
/// Falls back to a single download when nothing is configured, with a warning.
pub fn report_policy(settings: &Settings) -> SubcategoryPolicy {
    match settings.subcategory_policy {
        Some(policy) => policy,
        None => {
            eprintln!(
                "{} No subcategory completion policy configured, assuming {}",
                style("!").yellow(),
                SubcategoryPolicy::FixedCount(1)
            );
            SubcategoryPolicy::FixedCount(1)
        }
    }
}

pub fn print_issues(issues: &[ValidationIssue]) {
    for issue in issues {
        println!("  {} {}", style("!").yellow(), issue);
    }
}

/// Colored completion label.
pub fn completion_label(completed: bool) -> String {
    if completed {
        style("Complete").green().to_string()
    } else {
        style("In Progress").yellow().to_string()
    }
}
