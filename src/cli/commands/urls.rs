//! Processed URL queries.

use console::style;

use crawlstate::config::Settings;

use super::helpers::load_url_index;

/// Report whether a URL has already been processed.
pub async fn cmd_urls_check(settings: &Settings, url: &str) -> anyhow::Result<()> {
    let index = load_url_index(settings)?;

    if index.is_processed(url) {
        println!("{} Already processed: {}", style("✓").green(), url);
    } else {
        println!("{} Not processed: {}", style("!").yellow(), url);
        if let Err(reason) = settings.domain_filter().check(url) {
            println!("  {}", style(reason).dim());
        }
    }

    Ok(())
}

/// Show processed URL counts, overall or for one category.
pub async fn cmd_urls_stats(
    settings: &Settings,
    category: Option<&str>,
    subcategory: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let index = load_url_index(settings)?;

    let Some(category) = category else {
        let stats = index.stats();
        if json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("{:<20} {}", "Log:", index.path().display());
        println!("{:<20} {}", "Total URLs:", stats.total_urls);
        for (name, counts) in &stats.categories {
            println!("\n{} {}", style(name).bold(), counts.total);
            for (sub, count) in &counts.by_subcategory {
                println!("  {:<30} {}", sub, count);
            }
        }
        return Ok(());
    };

    let counts = index.stats_by_category(category, subcategory);
    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(());
    }

    let scope = match subcategory {
        Some(sub) => format!("{} / {}", category, sub),
        None => category.to_string(),
    };
    if counts.total == 0 {
        println!("{} No processed URLs for {}", style("!").yellow(), scope);
        return Ok(());
    }

    println!("{:<20} {}", "Scope:", scope);
    println!("{:<20} {}", "Total URLs:", counts.total);
    if subcategory.is_none() {
        for (sub, count) in &counts.by_subcategory {
            println!("  {:<30} {}", sub, count);
        }
    }

    Ok(())
}
