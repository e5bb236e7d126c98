//! Crawl settings
//!
//! Settings come from an optional TOML file with kebab-case keys grouped
//! into `[crawler]`, `[extraction]`, `[llm]` and `[output]` tables. Every
//! key has a default, so the crawler also runs without a file.
//!
//! ```no_run
//! use care_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("care-crawl.toml")).unwrap();
//! println!("secondary links per page: {}", config.crawler.max_secondary_links);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    CacheMode, Config, CrawlerConfig, DedupScope, ExtractionConfig, LlmConfig, OutputConfig,
    ProviderWebsite, SecondaryTrigger, DEFAULT_SEED_URLS,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
