use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::llm::prompts;
use crate::llm::{LanguageModel, LlmError, LlmResult, StructuredOutput, StructuredRequest};
use crate::model::taxonomy::resolve_category;
use crate::model::{
    CareResource, CategoryOutput, ExtractedProvider, ExtractedResource, MergedResources,
    RankedUrlList, ResourceList, ResourceProvider, ResourceTag, TagOutput,
};

/// The six places the crawler asks the model for structured output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallSite {
    Provider,
    Resources,
    Category,
    Tag,
    RankLinks,
    Merge,
}

impl CallSite {
    pub const ALL: [CallSite; 6] = [
        Self::Provider,
        Self::Resources,
        Self::Category,
        Self::Tag,
        Self::RankLinks,
        Self::Merge,
    ];

    /// Schema name sent with the request
    pub fn schema_name(&self) -> &'static str {
        match self {
            Self::Provider => "care_provider",
            Self::Resources => "care_resources",
            Self::Category => "resource_category",
            Self::Tag => "resource_tag",
            Self::RankLinks => "ranked_urls",
            Self::Merge => "merged_resources",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema_name())
    }
}

#[derive(Debug, Default)]
struct SiteCounters {
    calls: AtomicU64,
    failures: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

/// Running LLM call counters, one set per call site
#[derive(Debug, Default)]
pub struct LlmUsage {
    sites: [SiteCounters; 6],
}

impl LlmUsage {
    fn record_call(&self, site: CallSite) {
        self.sites[site.index()].calls.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self, site: CallSite) {
        self.sites[site.index()]
            .failures
            .fetch_add(1, Ordering::Relaxed);
    }

    fn record_tokens(&self, site: CallSite, prompt: u64, completion: u64) {
        let counters = &self.sites[site.index()];
        counters.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        counters
            .completion_tokens
            .fetch_add(completion, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn report(&self) -> UsageReport {
        let sites = CallSite::ALL
            .iter()
            .map(|site| {
                let c = &self.sites[site.index()];
                SiteUsage {
                    site: *site,
                    calls: c.calls.load(Ordering::Relaxed),
                    failures: c.failures.load(Ordering::Relaxed),
                    prompt_tokens: c.prompt_tokens.load(Ordering::Relaxed),
                    completion_tokens: c.completion_tokens.load(Ordering::Relaxed),
                }
            })
            .collect();

        UsageReport { sites }
    }
}

/// Counters for one call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteUsage {
    pub site: CallSite,
    pub calls: u64,
    pub failures: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    pub sites: Vec<SiteUsage>,
}

impl UsageReport {
    pub fn site(&self, site: CallSite) -> Option<&SiteUsage> {
        self.sites.iter().find(|s| s.site == site)
    }

    pub fn total_calls(&self) -> u64 {
        self.sites.iter().map(|s| s.calls).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.sites.iter().map(|s| s.failures).sum()
    }

    pub fn total_tokens(&self) -> u64 {
        self.sites
            .iter()
            .map(|s| s.prompt_tokens + s.completion_tokens)
            .sum()
    }
}

impl fmt::Display for UsageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "LLM usage: {} calls, {} failed, {} tokens",
            self.total_calls(),
            self.total_failures(),
            self.total_tokens()
        )?;
        for s in self.sites.iter().filter(|s| s.calls > 0) {
            writeln!(
                f,
                "  {:<18} {:>5} calls {:>4} failed {:>8} prompt {:>8} completion",
                s.site.schema_name(),
                s.calls,
                s.failures,
                s.prompt_tokens,
                s.completion_tokens
            )?;
        }
        Ok(())
    }
}

/// Issues the fixed-prompt extraction calls against a [`LanguageModel`]
///
/// Every call is bounded by the configured timeout and counted in the
/// shared [`LlmUsage`]. Page content is truncated to `max_content_chars`
/// before it is sent.
#[derive(Clone)]
pub struct Extractor {
    model: Arc<dyn LanguageModel>,
    usage: Arc<LlmUsage>,
    timeout: Duration,
    max_content_chars: usize,
    max_ranked_links: usize,
}

impl Extractor {
    pub fn new(model: Arc<dyn LanguageModel>, config: &LlmConfig) -> Self {
        Self {
            model,
            usage: Arc::new(LlmUsage::default()),
            timeout: config.timeout(),
            max_content_chars: config.max_content_chars,
            max_ranked_links: 5,
        }
    }

    /// Sets how many links the ranking prompt asks for
    pub fn with_max_ranked_links(mut self, max: usize) -> Self {
        self.max_ranked_links = max;
        self
    }

    pub fn usage(&self) -> &LlmUsage {
        &self.usage
    }

    /// Extracts the organization that publishes the page
    pub async fn extract_provider(&self, content: &str) -> LlmResult<ResourceProvider> {
        let user = prompts::provider_user(self.truncate(content));
        let extracted: ExtractedProvider = self
            .call(CallSite::Provider, prompts::EXTRACTION_SYSTEM.to_string(), user)
            .await?;
        Ok(extracted.into_provider())
    }

    /// Extracts resource candidates from page text
    ///
    /// Items that are not objects, carry `"error": true`, fail to decode, or
    /// have no name are skipped; their siblings are kept.
    pub async fn extract_resources(&self, content: &str) -> LlmResult<Vec<CareResource>> {
        let user = prompts::resource_user(self.truncate(content));
        let raw = self
            .complete(
                CallSite::Resources,
                prompts::EXTRACTION_SYSTEM.to_string(),
                user,
                ResourceList::strict_schema(),
            )
            .await?;

        self.parse_or_fail(CallSite::Resources, parse_resource_list(&raw))
    }

    /// Classifies a resource into the category taxonomy
    ///
    /// Returns `None` when the model answers with a category outside the
    /// taxonomy or with no category at all.
    pub async fn classify_category(
        &self,
        resource: &CareResource,
    ) -> LlmResult<Option<(String, Option<String>)>> {
        let output: CategoryOutput = self
            .call(
                CallSite::Category,
                prompts::category_system(),
                prompts::classify_user(&resource_summary(resource)),
            )
            .await?;

        let resolved = output.category.as_deref().and_then(|category| {
            resolve_category(category, output.subcategory.as_deref())
        });

        if resolved.is_none() {
            debug!(
                resource = %resource.resource_name,
                answer = ?output.category,
                "Category answer outside taxonomy"
            );
        }

        Ok(resolved.map(|(cat, sub)| (cat.to_string(), sub.map(str::to_string))))
    }

    /// Picks the single best tag for a resource
    pub async fn classify_tag(&self, resource: &CareResource) -> LlmResult<Option<ResourceTag>> {
        let output: TagOutput = self
            .call(
                CallSite::Tag,
                prompts::tag_system(),
                prompts::classify_user(&resource_summary(resource)),
            )
            .await?;
        Ok(output.tag)
    }

    /// Asks the model which links on the page most likely lead to resource detail
    ///
    /// Returns the URLs exactly as the model wrote them; resolution and
    /// filtering happen in the crawler.
    pub async fn rank_links(&self, content: &str) -> LlmResult<Vec<String>> {
        let output: RankedUrlList = self
            .call(
                CallSite::RankLinks,
                prompts::RANKER_SYSTEM.to_string(),
                prompts::ranker_user(self.truncate(content), self.max_ranked_links),
            )
            .await?;
        Ok(output.ranked_urls)
    }

    /// Combines several observations of the same resource into enriched records
    pub async fn merge_resources(
        &self,
        observations: &[CareResource],
        key: &str,
        provider: &ResourceProvider,
    ) -> LlmResult<Vec<CareResource>> {
        let rendered = observations
            .iter()
            .filter_map(|r| serde_json::to_string(r).ok())
            .collect::<Vec<_>>()
            .join("\n\n");
        let provider_json =
            serde_json::to_string(&provider.without_resources()).unwrap_or_default();

        let raw = self
            .complete(
                CallSite::Merge,
                prompts::MERGE_SYSTEM.to_string(),
                prompts::merge_user(key, self.truncate(&rendered), &provider_json),
                MergedResources::strict_schema(),
            )
            .await?;

        self.parse_or_fail(CallSite::Merge, parse_resource_list(&raw))
    }

    async fn call<T: StructuredOutput>(
        &self,
        site: CallSite,
        system: String,
        user: String,
    ) -> LlmResult<T> {
        let raw = self.complete(site, system, user, T::strict_schema()).await?;
        let parsed = serde_json::from_str(&raw)
            .map_err(|e| LlmError::Parse(format!("{} response: {}", site, e)));
        self.parse_or_fail(site, parsed)
    }

    async fn complete(
        &self,
        site: CallSite,
        system: String,
        user: String,
        schema: Value,
    ) -> LlmResult<String> {
        self.usage.record_call(site);

        let request = StructuredRequest {
            name: site.schema_name().to_string(),
            system,
            user,
            schema,
        };

        let result = match tokio::time::timeout(self.timeout, self.model.complete_structured(request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout)),
        };

        match result {
            Ok(response) => {
                if let Some(tokens) = response.usage {
                    self.usage
                        .record_tokens(site, tokens.prompt_tokens, tokens.completion_tokens);
                }
                Ok(response.content)
            }
            Err(e) => {
                self.usage.record_failure(site);
                warn!(call = %site, error = %e, "LLM call failed");
                Err(e)
            }
        }
    }

    fn parse_or_fail<T>(&self, site: CallSite, parsed: LlmResult<T>) -> LlmResult<T> {
        if let Err(e) = &parsed {
            self.usage.record_failure(site);
            warn!(call = %site, error = %e, "LLM response did not match schema");
        }
        parsed
    }

    fn truncate<'a>(&self, content: &'a str) -> &'a str {
        truncate_chars(content, self.max_content_chars)
    }
}

/// Cuts `content` to at most `max` characters on a char boundary
fn truncate_chars(content: &str, max: usize) -> &str {
    match content.char_indices().nth(max) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

/// Decodes a `{"resources": [...]}` answer item by item
///
/// A bare top-level array is accepted too.
fn parse_resource_list(raw: &str) -> LlmResult<Vec<CareResource>> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| LlmError::Parse(format!("invalid JSON: {}", e)))?;

    let items = match value {
        Value::Object(mut map) => match map.remove("resources") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(LlmError::Parse(format!(
                    "`resources` is not a list: {}",
                    other
                )))
            }
        },
        Value::Array(items) => items,
        other => {
            return Err(LlmError::Parse(format!(
                "expected an object with `resources`, got: {}",
                other
            )))
        }
    };

    let total = items.len();
    let resources: Vec<CareResource> = items
        .into_iter()
        .filter_map(|item| {
            if !item.is_object() {
                debug!(item = %item, "Skipping non-object resource entry");
                return None;
            }
            if item.get("error").and_then(Value::as_bool) == Some(true) {
                debug!("Skipping resource entry flagged as error");
                return None;
            }
            match serde_json::from_value::<ExtractedResource>(item) {
                Ok(extracted) => extracted.into_resource(),
                Err(e) => {
                    debug!(error = %e, "Skipping malformed resource entry");
                    None
                }
            }
        })
        .collect();

    if resources.len() < total {
        debug!(
            kept = resources.len(),
            skipped = total - resources.len(),
            "Dropped unusable resource entries"
        );
    }

    Ok(resources)
}

/// JSON rendering of the record used as classification input
fn resource_summary(resource: &CareResource) -> String {
    serde_json::to_string(resource).unwrap_or_else(|_| resource.resource_name.clone())
}
