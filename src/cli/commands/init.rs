//! Initialize command.

use console::style;

use crawlstate::config::{Config, Settings};
use crawlstate::models::catalog_hash;
use crawlstate::repository::WorkHierarchyStore;

use super::helpers::{load_url_index, print_issues};

/// Create the data directory and write a snapshot holding the configured catalog.
pub async fn cmd_init(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    std::fs::create_dir_all(&settings.data_dir)?;

    let rules = settings.completion_rules()?;
    let (store, issues) = WorkHierarchyStore::open(settings.snapshot_path(), &settings.catalog, rules)?;
    print_issues(&issues);

    let urls = load_url_index(settings)?;

    if settings.catalog.is_empty() {
        println!(
            "{} No categories configured in crawlstate.toml",
            style("!").yellow()
        );
        println!("  Add [[categories]] entries with a name and subcategories to get started");
    }

    let stats = &store.snapshot().statistics;
    println!("{:<20} {}", "Snapshot:", store.path().display());
    println!("{:<20} {}", "URL Log:", urls.path().display());
    println!("{:<20} {}", "Categories:", stats.total_categories);
    println!("{:<20} {}", "Subcategories:", stats.total_subcategories);
    println!("{:<20} {}", "Processed URLs:", urls.len());
    println!("{:<20} {}", "Pattern Rule:", rules.pattern);
    println!("{:<20} {}", "Subcategory Rule:", rules.subcategory);
    if !settings.catalog.is_empty() {
        println!("{:<20} {}", "Catalog Hash:", &catalog_hash(&settings.catalog)[..12]);
    }
    if config.source_path.is_some() {
        println!("{:<20} {}", "Config Hash:", &config.hash()[..12]);
    }

    println!(
        "{} Initialized crawlstate in {}",
        style("✓").green(),
        settings.data_dir.display()
    );

    Ok(())
}
