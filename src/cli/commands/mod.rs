//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod crawl;
mod query;
mod report;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "safecase")]
#[command(about = "Foreign-exchange enforcement case collector")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides config file and SAFECASE_DATA_DIR)
    #[arg(long, short = 'd', global = true)]
    data: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

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
    /// Crawl listing pages and store newly listed cases
    List {
        /// Regions by name or site code (default: all)
        regions: Vec<String>,
        /// Only regions with more listed than detailed cases
        #[arg(long)]
        pending: bool,
        /// First listing page
        #[arg(long, default_value = "1")]
        start: u32,
        /// Last listing page of the first pass
        #[arg(long, default_value = "1")]
        end: u32,
    },

    /// Fetch detail pages for listed cases that have none yet
    Details {
        /// Regions by name or site code (default: all)
        regions: Vec<String>,
        /// Only regions with more listed than detailed cases
        #[arg(long)]
        pending: bool,
    },

    /// Recompute and show the cases still waiting for details
    Pending {
        /// Regions by name or site code (default: all)
        regions: Vec<String>,
        /// Print every pending link
        #[arg(short, long)]
        links: bool,
    },

    /// Show stored case counts and staleness per region
    Status {
        /// Regions by name or site code (default: all)
        regions: Vec<String>,
    },

    /// Search stored case details
    Search {
        /// Earliest publish date (YYYY-MM-DD or YYYY/MM/DD)
        #[arg(long)]
        from: Option<String>,
        /// Latest publish date (YYYY-MM-DD or YYYY/MM/DD)
        #[arg(long)]
        to: Option<String>,
        /// Decision document number contains
        #[arg(long, default_value = "")]
        doc: String,
        /// Subject name contains
        #[arg(long, default_value = "")]
        subject: String,
        /// Violation type contains
        #[arg(long, default_value = "")]
        violation: String,
        /// Penalty content contains
        #[arg(long, default_value = "")]
        penalty: String,
        /// Issuing authority contains
        #[arg(long, default_value = "")]
        authority: String,
        /// Restrict to these regions (repeatable, default: all)
        #[arg(short, long = "region")]
        regions: Vec<String>,
        /// Minimum total penalty in 万元
        #[arg(long, default_value = "0")]
        min_amount: f64,
        /// Write matching records to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Rows to print (0 = all)
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Print every field of one case
    Show {
        /// Detail page link
        link: String,
    },

    /// Case counts per region and per month
    Stats,

    /// Total penalty per case
    Amounts {
        /// Also write the amount table into the store
        #[arg(long)]
        save: bool,
    },

    /// Export summary and detail tables as CSV files
    Export {
        /// Output directory (must not be the store directory)
        dir: PathBuf,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data: cli.data,
    };
    let (settings, _config) = load_settings_with_options(options)
        .await
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::List {
            regions,
            pending,
            start,
            end,
        } => crawl::cmd_list(&settings, &regions, pending, start, end).await,
        Commands::Details { regions, pending } => {
            crawl::cmd_details(&settings, &regions, pending).await
        }
        Commands::Pending { regions, links } => crawl::cmd_pending(&settings, &regions, links),
        Commands::Status { regions } => report::cmd_status(&settings, &regions),
        Commands::Search {
            from,
            to,
            doc,
            subject,
            violation,
            penalty,
            authority,
            regions,
            min_amount,
            output,
            limit,
        } => {
            let args = query::SearchArgs {
                from,
                to,
                doc,
                subject,
                violation,
                penalty,
                authority,
                regions,
                min_amount,
            };
            query::cmd_search(&settings, args, output.as_deref(), limit)
        }
        Commands::Show { link } => query::cmd_show(&settings, &link),
        Commands::Stats => report::cmd_stats(&settings),
        Commands::Amounts { save } => report::cmd_amounts(&settings, save),
        Commands::Export { dir } => report::cmd_export(&settings, &dir),
    }
}
