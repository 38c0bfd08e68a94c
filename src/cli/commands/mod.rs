//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod helpers;
mod init;
mod pattern;
mod resume;
mod status;
mod urls;
mod verify;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crawlstate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "crawlstate")]
#[command(about = "Resumable crawl checkpoint and URL deduplication store")]
#[command(version)]
pub struct Cli {
    /// Data directory holding the snapshot and URL log (overrides config file).
    #[arg(long, short = 'd', global = true, env = "CRAWLSTATE_DATA_DIR")]
    data: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and an initial snapshot from the catalog
    Init,

    /// Show crawl progress per category and subcategory
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show where the next run will pick up
    Resume {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Query the processed URL index
    Urls {
        #[command(subcommand)]
        command: UrlCommands,
    },

    /// Inspect recorded search patterns
    Pattern {
        #[command(subcommand)]
        command: PatternCommands,
    },

    /// Check the snapshot and URL log for damaged records
    Verify,
}

#[derive(Subcommand)]
enum UrlCommands {
    /// Check whether a URL was already processed
    Check {
        /// URL to look up
        url: String,
    },
    /// Show processed URL counts
    Stats {
        /// Limit to one category
        category: Option<String>,
        /// Limit to one subcategory of the category
        subcategory: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PatternCommands {
    /// Check whether search text was already run to completion anywhere
    Unique {
        /// Search text
        text: String,
    },
    /// Show one pattern by key or exact text
    Show {
        category: String,
        subcategory: String,
        /// Pattern key (pattern_N) or exact pattern text
        pattern: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the patterns of a subcategory
    List {
        category: String,
        subcategory: String,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
        data: cli.data,
    };
    let (settings, config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Init => init::cmd_init(&settings, &config).await,
        Commands::Status { json } => status::cmd_status(&settings, &config, json).await,
        Commands::Resume { json } => resume::cmd_resume(&settings, json).await,
        Commands::Urls { command } => match command {
            UrlCommands::Check { url } => urls::cmd_urls_check(&settings, &url).await,
            UrlCommands::Stats {
                category,
                subcategory,
                json,
            } => {
                urls::cmd_urls_stats(&settings, category.as_deref(), subcategory.as_deref(), json)
                    .await
            }
        },
        Commands::Pattern { command } => match command {
            PatternCommands::Unique { text } => pattern::cmd_pattern_unique(&settings, &text).await,
            PatternCommands::Show {
                category,
                subcategory,
                pattern,
                json,
            } => {
                pattern::cmd_pattern_show(&settings, &category, &subcategory, &pattern, json).await
            }
            PatternCommands::List {
                category,
                subcategory,
            } => pattern::cmd_pattern_list(&settings, &category, &subcategory).await,
        },
        Commands::Verify => verify::cmd_verify(&settings).await,
    }
}
