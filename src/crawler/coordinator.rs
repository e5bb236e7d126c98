//! Crawler coordinator - the top-level crawl driver
//!
//! This module runs a crawl job over a list of seed URLs:
//! - Owns the traversal context and hands it to the page processor
//! - Applies the politeness delay between seeds
//! - Merges duplicate observations after each seed subtree
//! - Writes the CSV export and the provider aggregate

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;

use crate::config::{Config, DedupScope};
use crate::crawler::context::TraversalContext;
use crate::crawler::fetcher::{HttpFetcher, PageFetcher};
use crate::crawler::processor::PageProcessor;
use crate::llm::{Extractor, LanguageModel, OpenAiCompatibleClient};
use crate::merge::MergeEngine;
use crate::model::{CareResource, ResourceProvider};
use crate::output::{write_resources_csv, CrawlStatistics};
use crate::storage::CheckpointStore;
use crate::CrawlError;

/// Default CSV file name, relative to the data directory
pub const DEFAULT_OUTPUT_FILE: &str = "resources.csv";

/// Everything a finished crawl job produced
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub session_id: String,

    /// Final flat list, in the order the resources were first seen
    pub resources: Vec<CareResource>,

    /// One provider per seed that yielded a page
    pub providers: Vec<ResourceProvider>,

    /// Visit keys of every URL crawled during the job
    pub crawled_urls: HashSet<String>,

    /// CSV path, when at least one resource was exported
    pub output_path: Option<PathBuf>,

    /// Provider aggregate path, when it was written
    pub provider_path: Option<PathBuf>,

    pub stats: CrawlStatistics,
}

/// Main crawl driver
pub struct Coordinator {
    config: Config,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Extractor,
    checkpoints: CheckpointStore,
    output_file: String,
}

impl Coordinator {
    /// Creates a coordinator over the given collaborators
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `fetcher` - Page fetch collaborator
    /// * `model` - Structured-output LLM collaborator
    pub fn new(config: Config, fetcher: Arc<dyn PageFetcher>, model: Arc<dyn LanguageModel>) -> Self {
        let extractor = Extractor::new(model, &config.llm)
            .with_max_ranked_links(config.crawler.max_ranked_links);
        let checkpoints = CheckpointStore::from_config(&config.output);

        Self {
            config,
            fetcher,
            extractor,
            checkpoints,
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
        }
    }

    /// Sets the CSV file name written under the data directory
    pub fn with_output_file(mut self, name: impl Into<String>) -> Self {
        self.output_file = name.into();
        self
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.config.output.data_dir).join(&self.output_file)
    }

    /// Runs the crawl over `seeds`
    ///
    /// Per-page failures never surface here; the only errors are an empty
    /// seed list and a CSV export that cannot be written.
    pub async fn run(&self, seeds: &[String]) -> Result<CrawlReport, CrawlError> {
        if seeds.is_empty() {
            return Err(CrawlError::NoSeeds);
        }

        let session_id = new_session_id();
        let processor = PageProcessor::new(
            &self.config,
            self.fetcher.clone(),
            self.extractor.clone(),
            &session_id,
        );
        let merger = MergeEngine::new(
            self.extractor.clone(),
            self.config.extraction.enrich_duplicates,
        );

        tracing::info!(
            "Starting crawl session {} over {} seed URLs",
            session_id,
            seeds.len()
        );
        let start_time = std::time::Instant::now();

        let mut stats = CrawlStatistics {
            seeds_total: seeds.len(),
            ..Default::default()
        };
        let mut ctx = TraversalContext::new();
        let mut crawled_urls: HashSet<String> = HashSet::new();
        let mut resources: Vec<CareResource> = Vec::new();
        let mut providers: Vec<ResourceProvider> = Vec::new();

        for (index, seed) in seeds.iter().enumerate() {
            if index > 0 {
                let delay = self.config.crawler.politeness_delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }

                if self.config.extraction.dedup_scope == DedupScope::Seed {
                    let finished = std::mem::take(&mut ctx);
                    stats.absorb_pages(&finished.stats);
                    crawled_urls.extend(finished.crawled_urls().iter().cloned());
                }
            }

            tracing::info!("Crawling seed {}/{}: {}", index + 1, seeds.len(), seed);
            let outcome = processor.process(seed, 0, None, &mut ctx).await;

            stats.duplicate_buckets += outcome
                .merged_by_key
                .values()
                .filter(|observations| observations.len() > 1)
                .count();

            let seed_resources = merger
                .consolidate(
                    outcome.records,
                    &outcome.merged_by_key,
                    outcome.provider.as_ref(),
                    ctx.seen_identifiers_mut(),
                )
                .await;

            if !seed_resources.is_empty() {
                stats.seeds_with_resources += 1;
            }
            if let Some(provider) = outcome.provider {
                providers.push(provider.snapshot_with(seed_resources.clone()));
            }

            resources.extend(seed_resources.iter().cloned());
            tracing::info!(
                "Found {} resources from {} (total: {})",
                seed_resources.len(),
                seed,
                resources.len()
            );
        }

        stats.absorb_pages(&ctx.stats);
        crawled_urls.extend(ctx.crawled_urls().iter().cloned());

        stats.resources_total = resources.len();
        stats.providers_total = providers.len();

        let output_path = if resources.is_empty() {
            tracing::warn!("No resources were extracted; nothing to export");
            None
        } else {
            let path = self.output_path();
            write_resources_csv(&resources, &path)?;
            tracing::info!("Saved {} resources to {}", resources.len(), path.display());
            Some(path)
        };

        let provider_path = self.write_providers(&providers);

        let usage = self.extractor.usage().report();
        tracing::info!(
            "LLM usage: {} calls, {} failures, {} tokens",
            usage.total_calls(),
            usage.total_failures(),
            usage.total_tokens()
        );
        stats.llm_usage = Some(usage);

        tracing::info!(
            "Crawl session {} completed: {} pages in {:?}",
            session_id,
            stats.pages_fetched,
            start_time.elapsed()
        );

        Ok(CrawlReport {
            session_id,
            resources,
            providers,
            crawled_urls,
            output_path,
            provider_path,
            stats,
        })
    }

    fn write_providers(&self, providers: &[ResourceProvider]) -> Option<PathBuf> {
        if !self.config.output.write_provider_aggregate || providers.is_empty() {
            return None;
        }

        match self.checkpoints.write_providers(providers) {
            Ok(path) => {
                tracing::info!("Saved {} providers to {}", providers.len(), path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!("Failed to write provider aggregate: {}", e);
                None
            }
        }
    }
}

/// Returns a new `crawl_session_<YYYYmmddHHMMSS>` identifier
pub fn new_session_id() -> String {
    format!("crawl_session_{}", Local::now().format("%Y%m%d%H%M%S"))
}

/// Runs a crawl with the HTTP fetcher and the configured LLM provider
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `seeds` - Seed URLs, crawled in order
/// * `output_file` - CSV file name under the data directory
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed
/// * `Err(CrawlError)` - No seeds, collaborator setup failed, or the export failed
pub async fn run_crawl(
    config: Config,
    seeds: &[String],
    output_file: &str,
) -> Result<CrawlReport, CrawlError> {
    let fetcher = HttpFetcher::new(&config.crawler)?;
    let model = OpenAiCompatibleClient::from_config(&config.llm)?;

    Coordinator::new(config, Arc::new(fetcher), Arc::new(model))
        .with_output_file(output_file)
        .run(seeds)
        .await
}
