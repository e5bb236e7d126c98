//! Crawler module for page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - Page fetching with rate-limit aware retry
//! - HTML to markdown rendering and link resolution
//! - Secondary-link ranking
//! - The recursive page processor and the crawl driver

mod context;
mod coordinator;
mod fetcher;
mod parser;
mod processor;
mod ranker;

pub use context::TraversalContext;
pub use coordinator::{new_session_id, run_crawl, Coordinator, CrawlReport, DEFAULT_OUTPUT_FILE};
pub use fetcher::{
    build_http_client, fetch_with_retry, FetchOptions, FetchResult, HttpFetcher, PageFetcher,
};
pub use parser::{render_markdown, resolve_link};
pub use processor::{PageOutcome, PageProcessor};
pub use ranker::{filter_ranked_links, LinkRanker};
