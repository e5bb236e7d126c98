//! Output module for the crawl's final artifacts
//!
//! This module handles:
//! - Exporting the aggregated resources as CSV
//! - Recording and printing crawl statistics

mod csv_export;
pub mod stats;

pub use csv_export::{render_field, write_resources_csv, LIST_SEPARATOR};
pub use stats::{print_statistics, CrawlStatistics};

use thiserror::Error;

/// Errors that can occur while writing output files
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
