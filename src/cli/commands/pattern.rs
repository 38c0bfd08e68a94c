//! Search pattern inspection commands.

use anyhow::anyhow;
use console::style;

use crawlstate::config::Settings;
use crawlstate::models::{PatternStatus, PatternView, Snapshot, SubcategoryRecord};
use crawlstate::services::PatternGuard;
use crawlstate::utils::normalize_pattern;

use super::helpers::read_snapshot;

fn find_record<'a>(
    snapshot: &'a Snapshot,
    category: &str,
    subcategory: &str,
) -> anyhow::Result<&'a SubcategoryRecord> {
    if snapshot.category(category).is_none() {
        return Err(anyhow!("Unknown category: {}", category));
    }
    snapshot
        .subcategory(category, subcategory)
        .ok_or_else(|| anyhow!("No patterns recorded for {} / {}", category, subcategory))
}

fn status_label(status: PatternStatus) -> String {
    match status {
        PatternStatus::Completed => style(status.as_str()).green().to_string(),
        PatternStatus::InProgress => style(status.as_str()).yellow().to_string(),
    }
}

/// Check search text against every completed pattern.
pub async fn cmd_pattern_unique(settings: &Settings, text: &str) -> anyhow::Result<()> {
    let snapshot = read_snapshot(settings)?;
    let guard = PatternGuard::from_snapshot(&snapshot);

    println!("{:<20} {}", "Normalized:", normalize_pattern(text));
    println!("{:<20} {}", "Completed Patterns:", guard.completed_count());
    if guard.is_unique(text) {
        println!("{} Pattern is unique", style("✓").green());
    } else {
        println!(
            "{} A completed pattern already covers this text",
            style("!").yellow()
        );
    }

    Ok(())
}

/// Show one pattern and its URL sets.
pub async fn cmd_pattern_show(
    settings: &Settings,
    category: &str,
    subcategory: &str,
    key_or_text: &str,
    json: bool,
) -> anyhow::Result<()> {
    let snapshot = read_snapshot(settings)?;
    let record = find_record(&snapshot, category, subcategory)?;
    let pattern = record.find_pattern(key_or_text).ok_or_else(|| {
        anyhow!(
            "Pattern not found: {} in {} / {}",
            key_or_text,
            category,
            subcategory
        )
    })?;
    let view = PatternView::new(category, subcategory, pattern);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("\n{}", style(format!("Pattern: {}", view.key)).bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Text:", view.text);
    println!("{:<20} {}", "Status:", status_label(view.status));
    println!("{:<20} {}", "Created:", view.created_at.format("%Y-%m-%d %H:%M"));
    println!("{:<20} {}", "Updated:", view.updated_at.format("%Y-%m-%d %H:%M"));
    println!("{:<20} {}", "Discovered:", view.discovered_count());

    for (label, urls) in [
        ("Pending:", &view.pending),
        ("Downloaded:", &view.downloaded),
        ("Failed:", &view.failed),
    ] {
        println!("{:<20} {}", label, urls.len());
        for url in urls {
            println!("  {}", style(url).dim());
        }
    }

    Ok(())
}

/// List the patterns of a subcategory in creation order.
pub async fn cmd_pattern_list(
    settings: &Settings,
    category: &str,
    subcategory: &str,
) -> anyhow::Result<()> {
    let snapshot = read_snapshot(settings)?;
    let record = find_record(&snapshot, category, subcategory)?;

    if record.patterns.is_empty() {
        println!("{} No patterns recorded", style("!").yellow());
        return Ok(());
    }

    println!(
        "{:<12} {:<12} {:>8} {:>8} {:>8}  {}",
        "KEY", "STATUS", "PENDING", "DONE", "FAILED", "TEXT"
    );
    for pattern in &record.patterns {
        let view = PatternView::new(category, subcategory, pattern);
        println!(
            "{:<12} {:<12} {:>8} {:>8} {:>8}  {}",
            view.key,
            view.status.as_str(),
            view.pending.len(),
            view.downloaded.len(),
            view.failed.len(),
            view.text
        );
    }
    println!("\n{:<20} {}", "Downloads:", record.download_count);

    Ok(())
}
