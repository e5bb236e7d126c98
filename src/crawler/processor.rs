//! Recursive page processor
//!
//! Processes one page of a crawl subtree: fetch, extract the provider and
//! resource candidates, decide whether the page's data is good enough, and
//! descend into ranked secondary links when it is not. All per-page failures
//! are logged with the offending URL and turned into an empty result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;

use crate::config::{Config, ProviderWebsite};
use crate::crawler::context::TraversalContext;
use crate::crawler::fetcher::{fetch_with_retry, FetchOptions, FetchResult, PageFetcher};
use crate::crawler::ranker::LinkRanker;
use crate::evaluate::CompletenessEvaluator;
use crate::llm::Extractor;
use crate::model::{CareResource, ResourceProvider};
use crate::storage::{CheckpointStore, StepCheckpoint};
use crate::url::{origin_of, visit_key};

/// What one page (and everything below it) contributed
#[derive(Debug, Clone, Default)]
pub struct PageOutcome {
    /// First-seen records, unique by name within the traversal
    pub records: Vec<CareResource>,

    /// Provider snapshot owning `records`, when a provider is known
    pub provider: Option<ResourceProvider>,

    /// Every observation of every name, duplicates included
    pub merged_by_key: HashMap<String, Vec<CareResource>>,
}

impl PageOutcome {
    fn empty(provider: Option<ResourceProvider>) -> Self {
        Self {
            provider,
            ..Default::default()
        }
    }

    fn absorb(&mut self, child: PageOutcome) {
        self.records.extend(child.records);
        for (key, observations) in child.merged_by_key {
            self.merged_by_key.entry(key).or_default().extend(observations);
        }
    }
}

/// Runs the fetch / extract / evaluate / recurse cycle for one page
pub struct PageProcessor {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Extractor,
    ranker: LinkRanker,
    evaluator: CompletenessEvaluator,
    checkpoints: Option<CheckpointStore>,
    fetch_options: FetchOptions,
    max_depth: u32,
    max_secondary_links: usize,
    max_fetch_retries: u32,
    retry_backoff: Duration,
    provider_website: ProviderWebsite,
}

impl PageProcessor {
    /// Builds a processor from the job config
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Extractor,
        session_id: &str,
    ) -> Self {
        let crawler = &config.crawler;
        let extraction = &config.extraction;

        Self {
            fetcher,
            ranker: LinkRanker::new(extractor.clone(), crawler.max_ranked_links),
            extractor,
            evaluator: CompletenessEvaluator::from_keys(
                &extraction.required_keys,
                extraction.secondary_trigger,
                extraction.min_field_ratio,
            ),
            checkpoints: Some(CheckpointStore::from_config(&config.output)),
            fetch_options: FetchOptions::from_config(crawler, session_id),
            max_depth: crawler.max_depth,
            max_secondary_links: crawler.max_secondary_links,
            max_fetch_retries: crawler.max_fetch_retries,
            retry_backoff: Duration::from_secs(crawler.retry_backoff_secs),
            provider_website: extraction.provider_website,
        }
    }

    /// Replaces the checkpoint store; `None` disables step checkpoints
    pub fn with_checkpoints(mut self, checkpoints: Option<CheckpointStore>) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    /// Overrides the linear backoff step of the fetch retry wrapper
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Processes `url` at `depth`, recursing into secondary links
    ///
    /// `parent_provider` is ignored at depth 0, where the provider is
    /// extracted from the page itself. Returns an empty outcome when the
    /// URL was already crawled, the depth bound is exceeded, or the fetch
    /// fails.
    pub fn process<'a>(
        &'a self,
        url: &'a str,
        depth: u32,
        parent_provider: Option<ResourceProvider>,
        ctx: &'a mut TraversalContext,
    ) -> BoxFuture<'a, PageOutcome> {
        Box::pin(self.process_page(url, depth, parent_provider, ctx))
    }

    async fn process_page(
        &self,
        url: &str,
        depth: u32,
        parent_provider: Option<ResourceProvider>,
        ctx: &mut TraversalContext,
    ) -> PageOutcome {
        if ctx.is_crawled(url) {
            tracing::debug!("Skipping {}: already crawled", url);
            return PageOutcome::empty(parent_provider);
        }
        if depth > self.max_depth {
            tracing::debug!("Skipping {}: depth {} exceeds {}", url, depth, self.max_depth);
            return PageOutcome::empty(parent_provider);
        }

        tracing::info!("Crawling {} (depth {})", url, depth);
        ctx.mark_crawled(url);

        let fetch = fetch_with_retry(
            self.fetcher.as_ref(),
            url,
            &self.fetch_options,
            self.max_fetch_retries,
            self.retry_backoff,
        )
        .await;

        let canonical = if fetch.url.trim().is_empty() {
            url.to_string()
        } else {
            fetch.url.clone()
        };
        if visit_key(&canonical) != visit_key(url) && !ctx.mark_crawled(&canonical) {
            tracing::info!("{} redirected to already crawled {}", url, canonical);
            return PageOutcome::empty(parent_provider);
        }

        if !fetch.has_content() {
            tracing::error!(
                "Failed to crawl {}: {}",
                url,
                fetch.error_message.as_deref().unwrap_or("no text content")
            );
            ctx.stats.fetch_failures += 1;
            return PageOutcome::empty(parent_provider);
        }
        ctx.stats.pages_fetched += 1;

        let provider = if depth == 0 {
            Some(self.seed_provider(url, &canonical, &fetch.markdown).await)
        } else {
            parent_provider
        };

        let candidates = self
            .extract_candidates(url, &canonical, &fetch.markdown, provider.as_ref())
            .await;
        let complete = candidates
            .iter()
            .filter(|c| self.evaluator.is_complete(c))
            .count();
        tracing::info!(
            "Extracted {} candidates from {} ({} complete)",
            candidates.len(),
            url,
            complete
        );

        let needs_secondary =
            depth < self.max_depth && self.evaluator.needs_secondary_crawl(&candidates);
        let ranked_links = if needs_secondary {
            ctx.stats.secondary_crawls += 1;
            self.ranker.rank(&fetch.markdown, &canonical).await
        } else {
            Vec::new()
        };

        self.checkpoint(url, depth, &fetch, provider.as_ref(), &candidates, &ranked_links, ctx);

        let mut outcome = PageOutcome::empty(None);
        for candidate in candidates {
            let record = self.reclassify(candidate, url, &canonical).await;
            let key = record.resource_name.clone();
            if ctx.admit(&key) {
                outcome.records.push(record.clone());
            } else {
                tracing::debug!("Duplicate resource '{}' on {}", key, url);
            }
            outcome.merged_by_key.entry(key).or_default().push(record);
        }

        if needs_secondary {
            for link in ranked_links.iter().take(self.max_secondary_links) {
                let child = self.process(link, depth + 1, provider.clone(), ctx).await;
                outcome.absorb(child);
            }
        }

        outcome.provider = match provider {
            Some(provider) if !outcome.records.is_empty() => {
                Some(provider.snapshot_with(outcome.records.clone()))
            }
            Some(provider) => Some(provider.without_resources()),
            None => None,
        };
        outcome
    }

    /// Extracts the seed page's provider, falling back to a bare website
    async fn seed_provider(&self, requested: &str, canonical: &str, content: &str) -> ResourceProvider {
        let website = match self.provider_website {
            ProviderWebsite::Canonical => canonical,
            ProviderWebsite::Requested => requested,
        };

        let mut provider = match self.extractor.extract_provider(content).await {
            Ok(provider) => provider,
            Err(e) => {
                tracing::error!("Provider extraction failed for {}: {}", requested, e);
                ResourceProvider::default()
            }
        };
        provider.website = Some(website.to_string());
        provider.resources.clear();
        provider
    }

    async fn extract_candidates(
        &self,
        url: &str,
        canonical: &str,
        content: &str,
        provider: Option<&ResourceProvider>,
    ) -> Vec<CareResource> {
        let mut candidates = match self.extractor.extract_resources(content).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!("Resource extraction failed for {}: {}", url, e);
                return Vec::new();
            }
        };

        let origin = origin_of(canonical);
        let provider_name = provider.and_then(|p| p.provider_name.clone());
        for candidate in &mut candidates {
            candidate.source_url = Some(url.to_string());
            candidate.source_origin = origin.clone();
            let named = candidate
                .provider_name
                .as_deref()
                .map(|n| !n.trim().is_empty())
                .unwrap_or(false);
            if !named {
                candidate.provider_name = provider_name.clone();
            }
        }
        candidates
    }

    /// Assigns category, subcategory and tag, then stamps provenance
    async fn reclassify(&self, mut record: CareResource, url: &str, canonical: &str) -> CareResource {
        match self.extractor.classify_category(&record).await {
            Ok(Some((category, subcategory))) => {
                record.resource_category = Some(category);
                record.resource_subcategory = subcategory;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(
                "Category classification failed for '{}' on {}: {}",
                record.resource_name,
                url,
                e
            ),
        }

        match self.extractor.classify_tag(&record).await {
            Ok(Some(tag)) => {
                record.tags.insert(tag);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(
                "Tag classification failed for '{}' on {}: {}",
                record.resource_name,
                url,
                e
            ),
        }

        let now = Utc::now();
        record.source_url = Some(url.to_string());
        record.source_origin = origin_of(canonical);
        record.date_added_to_db = Some(now);
        record.date_last_reviewed = Some(now);
        record
    }

    #[allow(clippy::too_many_arguments)]
    fn checkpoint(
        &self,
        url: &str,
        depth: u32,
        fetch: &FetchResult,
        provider: Option<&ResourceProvider>,
        candidates: &[CareResource],
        ranked_links: &[String],
        ctx: &mut TraversalContext,
    ) {
        let Some(store) = &self.checkpoints else {
            return;
        };

        let step = StepCheckpoint {
            url: url.to_string(),
            depth,
            session_id: self.fetch_options.session_id.clone(),
            fetch: fetch.clone(),
            provider: provider.cloned(),
            candidates: candidates.to_vec(),
            ranked_links: ranked_links.to_vec(),
            written_at: Utc::now(),
        };

        match store.write_step(&step) {
            Ok(path) => tracing::debug!("Checkpoint for {} written to {}", url, path.display()),
            Err(e) => {
                tracing::warn!("Failed to write checkpoint for {}: {}", url, e);
                ctx.stats.checkpoint_failures += 1;
            }
        }
    }
}
