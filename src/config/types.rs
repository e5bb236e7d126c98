use serde::Deserialize;
use std::time::Duration;

/// Seeds used when neither the command line nor the config file names any
pub const DEFAULT_SEED_URLS: &[&str] = &[
    "https://www.alz.org/help-support/caregiving",
    "https://www.caregiver.org/connecting-caregivers/support-groups/",
    "https://www.wearehfc.org/caregiver-resources",
    "https://www.nia.nih.gov/health/alzheimers-caregiving",
];

/// Main configuration structure for Care-Crawl
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub extraction: ExtractionConfig,
    pub llm: LlmConfig,
    pub output: OutputConfig,
    pub seeds: Vec<String>,
}

impl Config {
    /// Returns the seeds from the config file, or the compiled-in list
    pub fn seed_urls(&self) -> Vec<String> {
        if self.seeds.is_empty() {
            DEFAULT_SEED_URLS.iter().map(|s| s.to_string()).collect()
        } else {
            self.seeds.clone()
        }
    }
}

/// Crawl traversal and fetch behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of secondary-link hops from a seed URL
    pub max_depth: u32,

    /// Maximum number of ranked links followed from one page
    pub max_secondary_links: usize,

    /// Maximum number of links the ranker may return
    pub max_ranked_links: usize,

    /// Pause between consecutive seed URLs (milliseconds)
    pub politeness_delay_ms: u64,

    /// Attempts made by the fetch retry wrapper
    pub max_fetch_retries: u32,

    /// Linear backoff step for rate-limited fetches (seconds)
    pub retry_backoff_secs: u64,

    /// Upper bound on a single fetch, including retries of the transport
    pub fetch_timeout_secs: u64,

    /// CSS selector restricting which part of the page is rendered
    pub css_selector: Option<String>,

    /// Drop images and other non-text content from the rendered markdown
    pub text_only: bool,

    pub cache_mode: CacheMode,

    /// Maximum number of fetches in flight
    pub concurrency_cap: usize,

    /// Mean delay applied before each fetch (milliseconds)
    pub mean_delay_ms: u64,

    /// Random jitter added on top of the mean delay (milliseconds)
    pub jitter_range_ms: u64,

    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 1,
            max_secondary_links: 3,
            max_ranked_links: 5,
            politeness_delay_ms: 2000,
            max_fetch_retries: 3,
            retry_backoff_secs: 5,
            fetch_timeout_secs: 60,
            css_selector: Some("body".to_string()),
            text_only: true,
            cache_mode: CacheMode::Bypass,
            concurrency_cap: 2,
            mean_delay_ms: 2000,
            jitter_range_ms: 3000,
            user_agent: format!("care-crawl/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl CrawlerConfig {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Whether the fetcher may serve pages from its cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    Enabled,
    #[default]
    Bypass,
}

/// Extraction, evaluation and deduplication policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtractionConfig {
    /// Field names that must be non-empty for a record to be complete
    pub required_keys: Vec<String>,

    pub secondary_trigger: SecondaryTrigger,

    pub dedup_scope: DedupScope,

    pub provider_website: ProviderWebsite,

    /// Merge all observations of a repeated resource name after each seed
    pub enrich_duplicates: bool,

    /// Fraction of should-have fields below which a record is too sparse
    pub min_field_ratio: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            required_keys: vec![
                "resource_name".to_string(),
                "resource_category".to_string(),
                "description".to_string(),
                "source_url".to_string(),
            ],
            secondary_trigger: SecondaryTrigger::TooSparse,
            dedup_scope: DedupScope::Job,
            provider_website: ProviderWebsite::Canonical,
            enrich_duplicates: true,
            min_field_ratio: 0.5,
        }
    }
}

/// Which completeness predicate decides that a page needs a secondary crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SecondaryTrigger {
    /// No candidates, or any candidate is missing too many should-have fields
    #[default]
    TooSparse,
    /// No candidates, or none of them is complete
    NoComplete,
}

/// Lifetime of the visited-URL and seen-identifier sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DedupScope {
    /// One pair of sets for the whole job
    #[default]
    Job,
    /// A fresh pair for every seed URL
    Seed,
}

/// Which URL is recorded as the provider's website
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderWebsite {
    /// The URL reported by the fetcher after redirects
    #[default]
    Canonical,
    /// The URL the seed page was requested with
    Requested,
}

/// LLM provider settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible chat completions API
    pub base_url: String,

    pub model: String,

    /// Name of the environment variable holding the API key
    pub api_key_env: String,

    pub temperature: f32,

    pub timeout_secs: u64,

    /// Page content longer than this is truncated before prompting
    pub max_content_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            temperature: 0.2,
            timeout_secs: 120,
            max_content_chars: 60_000,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory holding the CSV export and provider aggregate
    pub data_dir: String,

    /// Step checkpoint directory, relative to `data_dir`
    pub checkpoint_dir: String,

    /// Provider aggregate file name, relative to `data_dir`
    pub provider_file: String,

    pub write_provider_aggregate: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            checkpoint_dir: "crawl".to_string(),
            provider_file: "providers.json.zst".to_string(),
            write_provider_aggregate: true,
        }
    }
}
