//! Integrity check for the data directory.

use console::style;

use crawlstate::config::Settings;
use crawlstate::repository::{checkpoint, ProcessedUrlIndex};
use crawlstate::StoreError;

use super::helpers::print_issues;

/// Report damaged records without repairing anything.
///
/// Exits with an error when problems were found.
pub async fn cmd_verify(settings: &Settings) -> anyhow::Result<()> {
    let snapshot_path = settings.snapshot_path();
    let mut problems = 0;

    println!("{}", style("Snapshot").bold());
    match checkpoint::inspect_snapshot(&snapshot_path) {
        Ok(None) => {
            println!("  {} No snapshot at {}", style("!").yellow(), snapshot_path.display());
        }
        Ok(Some((snapshot, issues))) => {
            if issues.is_empty() {
                println!(
                    "  {} {} categories, {} patterns",
                    style("✓").green(),
                    snapshot.statistics.total_categories,
                    snapshot.statistics.total_patterns
                );
            } else {
                println!(
                    "  {} {} repair(s) will be applied on next open",
                    style("!").yellow(),
                    issues.len()
                );
                print_issues(&issues);
                problems += issues.len();
            }
        }
        Err(err @ StoreError::Snapshot { .. }) => {
            println!("  {} {}", style("✗").red(), err);
            println!("  The file will be moved aside on next open");
            problems += 1;
        }
        Err(err) => return Err(err.into()),
    }

    let quarantined = checkpoint::quarantined_files(&snapshot_path);
    if !quarantined.is_empty() {
        println!("  {} Quarantined copies:", style("!").yellow());
        for path in &quarantined {
            println!("    {}", path.display());
        }
    }

    println!("{}", style("Processed URL log").bold());
    let (index, issues) =
        ProcessedUrlIndex::load(settings.url_log_path(), settings.domain_filter())?;
    if issues.is_empty() {
        println!("  {} {} URLs", style("✓").green(), index.len());
    } else {
        println!(
            "  {} {} URLs, {} line(s) skipped",
            style("!").yellow(),
            index.len(),
            issues.len()
        );
        print_issues(&issues);
        problems += issues.len();
    }

    if problems > 0 {
        anyhow::bail!("{} problem(s) found", problems);
    }
    println!("{} Data directory is consistent", style("✓").green());
    Ok(())
}
