//! Crawl progress report.

use console::style;

use crawlstate::config::{Config, Settings};
use crawlstate::models::catalog_hash;
use crawlstate::repository::ProgressSummary;

use super::helpers::{completion_label, read_snapshot, report_policy};

/// Show progress per category and subcategory.
pub async fn cmd_status(settings: &Settings, config: &Config, json: bool) -> anyhow::Result<()> {
    let snapshot = read_snapshot(settings)?;
    let policy = report_policy(settings);
    let summary = ProgressSummary::from_snapshot(&snapshot, policy);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.categories.is_empty() {
        println!(
            "{} No crawl state in {}",
            style("!").yellow(),
            settings.data_dir.display()
        );
        println!("  Run 'crawlstate init' to create it");
        return Ok(());
    }

    if let Some(ref recorded) = snapshot.catalog_hash {
        if !settings.catalog.is_empty() && *recorded != catalog_hash(&settings.catalog) {
            println!(
                "{} Configured catalog differs from the one recorded in the snapshot",
                style("!").yellow()
            );
        }
    }

    let stats = &summary.statistics;
    println!("\n{}", style("Crawl Status").bold());
    println!("{}", "-".repeat(40));
    println!(
        "{:<20} {}/{}",
        "Categories:", stats.completed_categories, stats.total_categories
    );
    println!(
        "{:<20} {}/{} ({:.1}%)",
        "Subcategories:",
        stats.completed_subcategories,
        stats.total_subcategories,
        stats.subcategory_completion_pct()
    );
    println!(
        "{:<20} {}/{} ({:.1}%)",
        "Patterns:",
        stats.completed_patterns,
        stats.total_patterns,
        stats.pattern_completion_pct()
    );
    println!("{:<20} {}", "URLs Discovered:", stats.urls_discovered);
    println!("{:<20} {}", "URLs Pending:", stats.urls_pending);
    println!("{:<20} {}", "Downloads:", stats.total_downloads);
    println!("{:<20} {}", "Today's Downloads:", stats.downloads_today);
    println!("{:<20} {}", "Failures:", stats.total_failures);
    println!(
        "{:<20} {} ok, {} failed",
        "Searches:", stats.successful_searches, stats.failed_searches
    );
    if let Some(updated) = stats.last_updated {
        println!("{:<20} {}", "Last Updated:", updated.format("%Y-%m-%d %H:%M"));
    }
    if let Some(ref position) = summary.current_position {
        let mut cursor = format!("{} / {}", position.category, position.subcategory);
        if let Some(ref key) = position.pattern_key {
            cursor.push_str(&format!(" / {}", key));
        }
        println!("{:<20} {}", "Position:", cursor);
    }
    if config.source_path.is_none() {
        println!("{:<20} {}", "Config:", style("none found").dim());
    }

    if !summary.daily_downloads.is_empty() {
        println!("\n{}", style("Downloads by Day").bold());
        for (day, count) in summary.daily_downloads.iter().rev().take(7) {
            println!("  {:<18} {}", day.to_string(), count);
        }
    }

    for category in &summary.categories {
        println!(
            "\n{} {}",
            style(&category.name).bold(),
            completion_label(category.completed)
        );
        for sub in &category.subcategories {
            let marker = if sub.completed {
                style("✓").green()
            } else {
                style("·").dim()
            };
            println!(
                "  {} {:<28} {:>4}/{:<4} downloads  {}/{} patterns",
                marker,
                sub.name,
                sub.download_count,
                sub.required_downloads,
                sub.completed_patterns,
                sub.patterns
            );
        }
    }

    let remaining = summary.remaining_subcategories();
    println!();
    if remaining == 0 {
        println!("{} All subcategories complete", style("✓").green());
    } else {
        println!("{} {} subcategories remaining", style("!").yellow(), remaining);
    }

    Ok(())
}
