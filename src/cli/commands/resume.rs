//! Resume point command.

use console::style;

use crawlstate::config::Settings;
use crawlstate::services::{resume_from_disk, ResumeDecision};

use super::helpers::report_policy;

/// Show the work a new run would start with.
pub async fn cmd_resume(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let policy = report_policy(settings);
    let decision = resume_from_disk(&settings.snapshot_path(), policy)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    println!("{:<20} {}", "Action:", style(decision.as_str()).cyan());
    match decision {
        ResumeDecision::ResumeDownloads {
            category,
            subcategory,
            pattern_key,
            pending_urls,
        } => {
            println!("{:<20} {}", "Category:", category);
            println!("{:<20} {}", "Subcategory:", subcategory);
            println!("{:<20} {}", "Pattern:", pattern_key);
            println!("{:<20} {}", "Pending URLs:", pending_urls.len());
            for url in &pending_urls {
                println!("  {}", style(url).dim());
            }
        }
        ResumeDecision::StartNewPattern {
            category,
            subcategory,
            pattern_index,
        } => {
            println!("{:<20} {}", "Category:", category);
            println!("{:<20} {}", "Subcategory:", subcategory);
            println!("{:<20} {}", "Patterns So Far:", pattern_index);
        }
        ResumeDecision::AllComplete => {
            println!("{} Nothing left to crawl", style("✓").green());
        }
    }

    Ok(())
}
