//! Care-Crawl main entry point
//!
//! This is the command-line interface for the caregiver resource crawler.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use care_crawl::config::{load_config_with_hash, validate, Config};
use care_crawl::crawler::{run_crawl, DEFAULT_OUTPUT_FILE};
use care_crawl::output::print_statistics;
use tracing_subscriber::EnvFilter;

/// Care-Crawl: a caregiver resource crawler
///
/// Care-Crawl fetches caregiver resource pages, extracts structured records
/// with an LLM, follows promising links when a page is incomplete, and
/// exports the merged results as CSV.
#[derive(Parser, Debug)]
#[command(name = "care-crawl")]
#[command(version)]
#[command(about = "Crawls caregiver resource pages into a CSV", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to TOML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the given URLs (or the configured seeds) and export a CSV
    Run {
        /// Seed URLs; the configured or built-in list is used when empty
        #[arg(value_name = "URL")]
        urls: Vec<String>,

        /// CSV file name, written under the data directory
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_OUTPUT_FILE)]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    if dotenvy::dotenv().is_ok() {
        tracing::debug!("Loaded environment from .env");
    }

    let config = load_configuration(cli.config.as_deref())?;

    match cli.command {
        Command::Run { urls, output } => handle_run(config, urls, &output).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("care_crawl=info,warn"),
            1 => EnvFilter::new("care_crawl=debug,info"),
            2 => EnvFilter::new("care_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file when given, otherwise the built-in defaults
fn load_configuration(path: Option<&std::path::Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        tracing::info!("No configuration file given, using defaults");
        let config = Config::default();
        validate(&config)?;
        return Ok(config);
    };

    tracing::info!("Loading configuration from: {}", path.display());
    match load_config_with_hash(path) {
        Ok((config, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok(config)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the run command
async fn handle_run(
    config: Config,
    urls: Vec<String>,
    output: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let seeds = if urls.is_empty() {
        config.seed_urls()
    } else {
        urls
    };

    if seeds.is_empty() {
        tracing::error!("No URLs to crawl");
        return Err(care_crawl::CrawlError::NoSeeds.into());
    }

    tracing::info!("Total seed URLs: {}", seeds.len());

    match run_crawl(config, &seeds, output).await {
        Ok(report) => {
            tracing::info!("Crawl completed successfully");
            println!();
            print_statistics(&report.stats);
            if let Some(path) = &report.output_path {
                println!("\nResources written to: {}", path.display());
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
