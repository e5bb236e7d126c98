//! Care-Crawl: caregiver resource crawler
//!
//! Seed pages are fetched and rendered to markdown, an LLM turns them into
//! [`CareResource`] records, and pages that come back too sparse are
//! supplemented by following the links the LLM ranks highest. Records that
//! describe the same program are merged before the CSV export.

pub mod config;
pub mod crawler;
pub mod evaluate;
pub mod llm;
pub mod merge;
pub mod model;
pub mod output;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Errors that end a crawl job
///
/// Failures scoped to a single page are logged and counted instead.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No seed URLs to crawl")]
    NoSeeds,

    #[error("LLM setup failed: {0}")]
    Llm(#[from] llm::LlmError),

    #[error("Export failed: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Problems with the TOML configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Reasons a string is not a crawlable page URL
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

pub use config::Config;
pub use crawler::{Coordinator, CrawlReport, PageProcessor, TraversalContext};
pub use model::{CareResource, ResourceProvider};
pub use url::{origin_of, sanitize_filename, visit_key};
