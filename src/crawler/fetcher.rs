//! Page fetching
//!
//! This module handles all page retrieval for the crawler, including:
//! - The `PageFetcher` seam the page processor depends on
//! - An HTTP implementation with bounded concurrency, delay and jitter
//! - Redirect handling (the final URL is reported as canonical)
//! - Rate-limit aware retry with linear backoff

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{redirect::Policy, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use url::Url;

use crate::config::{CacheMode, CrawlerConfig};
use crate::crawler::parser::render_markdown;
use crate::llm::{is_rate_limit_message, RATE_LIMIT_SIGNATURE};

/// Outcome of fetching one page
///
/// Callers must check `success`; a failed fetch still carries the URL and
/// an error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub success: bool,
    /// Canonical URL (after redirects)
    pub url: String,
    /// Page text rendered as markdown
    pub markdown: String,
    pub error_message: Option<String>,
    pub status_code: Option<u16>,
}

impl FetchResult {
    pub fn ok(url: impl Into<String>, markdown: impl Into<String>) -> Self {
        Self {
            success: true,
            url: url.into(),
            markdown: markdown.into(),
            error_message: None,
            status_code: Some(200),
        }
    }

    pub fn failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            url: url.into(),
            markdown: String::new(),
            error_message: Some(message.into()),
            status_code: None,
        }
    }

    /// True if the fetch succeeded and produced text
    pub fn has_content(&self) -> bool {
        self.success && !self.markdown.trim().is_empty()
    }

    /// True if the failure reason carries the rate-limit signature
    pub fn is_rate_limited(&self) -> bool {
        !self.success
            && self
                .error_message
                .as_deref()
                .map(is_rate_limit_message)
                .unwrap_or(false)
    }
}

/// Per-request fetch settings
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub cache_mode: CacheMode,
    pub session_id: String,
    pub css_selector: Option<String>,
    pub text_only: bool,
    pub concurrency_cap: usize,
    pub mean_delay: Duration,
    pub jitter_range: Duration,
}

impl FetchOptions {
    pub fn from_config(config: &CrawlerConfig, session_id: impl Into<String>) -> Self {
        Self {
            cache_mode: config.cache_mode,
            session_id: session_id.into(),
            css_selector: config.css_selector.clone(),
            text_only: config.text_only,
            concurrency_cap: config.concurrency_cap,
            mean_delay: Duration::from_millis(config.mean_delay_ms),
            jitter_range: Duration::from_millis(config.jitter_range_ms),
        }
    }
}

/// Retrieves a page and renders it to markdown
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Never returns an error; failures are reported through [`FetchResult`]
    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration (user agent and timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.fetch_timeout())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`PageFetcher`] backed by `reqwest` and `scraper`
///
/// In-flight requests are bounded by one semaphore per distinct
/// `concurrency_cap` seen in the request options. Each request waits `mean_delay` plus a random jitter in
/// `[0, jitter_range)` while holding its permit.
pub struct HttpFetcher {
    client: Client,
    limits: Mutex<HashMap<usize, Arc<Semaphore>>>,
    cache: Mutex<HashMap<String, FetchResult>>,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(config)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            limits: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter(&self, concurrency_cap: usize) -> Arc<Semaphore> {
        let cap = concurrency_cap.max(1);
        self.limits
            .lock()
            .await
            .entry(cap)
            .or_insert_with(|| Arc::new(Semaphore::new(cap)))
            .clone()
    }

    async fn fetch_uncached(&self, url: &str, options: &FetchOptions) -> FetchResult {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                let message = if e.is_timeout() {
                    "Request timeout".to_string()
                } else if e.is_connect() {
                    format!("Connection failed: {}", e)
                } else {
                    e.to_string()
                };
                return FetchResult::failed(url, message);
            }
        };

        let status = response.status();
        let final_url = response.url().clone();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return FetchResult {
                status_code: Some(status.as_u16()),
                ..FetchResult::failed(
                    final_url.as_str(),
                    format!("HTTP 429: {}", RATE_LIMIT_SIGNATURE),
                )
            };
        }

        if !status.is_success() {
            return FetchResult {
                status_code: Some(status.as_u16()),
                ..FetchResult::failed(final_url.as_str(), format!("HTTP {}", status))
            };
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_ascii_lowercase();

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return FetchResult::failed(final_url.as_str(), e.to_string()),
        };

        let markdown = if content_type.contains("text/html")
            || content_type.contains("application/xhtml")
        {
            match render_markdown(
                &body,
                &final_url,
                options.css_selector.as_deref(),
                options.text_only,
            ) {
                Ok(markdown) => markdown,
                Err(e) => return FetchResult::failed(final_url.as_str(), e),
            }
        } else if content_type.starts_with("text/") {
            body
        } else {
            return FetchResult::failed(
                final_url.as_str(),
                format!("Unsupported content type: {}", content_type),
            );
        };

        FetchResult {
            status_code: Some(status.as_u16()),
            ..FetchResult::ok(final_url.as_str(), markdown)
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult {
        if Url::parse(url).is_err() {
            return FetchResult::failed(url, format!("Invalid URL: {}", url));
        }

        if options.cache_mode == CacheMode::Enabled {
            if let Some(hit) = self.cache.lock().await.get(url) {
                tracing::debug!("Cache hit for {}", url);
                return hit.clone();
            }
        }

        let limiter = self.limiter(options.concurrency_cap).await;
        let _permit = match limiter.acquire().await {
            Ok(permit) => permit,
            Err(_) => return FetchResult::failed(url, "Fetcher is shutting down"),
        };

        let jitter_ms = options.jitter_range.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        } else {
            Duration::ZERO
        };
        let delay = options.mean_delay + jitter;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        tracing::debug!(session = %options.session_id, "Fetching {}", url);
        let result = self.fetch_uncached(url, options).await;

        if options.cache_mode == CacheMode::Enabled && result.success {
            self.cache.lock().await.insert(url.to_string(), result.clone());
        }

        result
    }
}

/// Fetches a URL, retrying only on rate-limit failures
///
/// Makes at most `max_retries` attempts (at least one). After a rate-limited
/// attempt `i` (0-based) it waits `backoff_unit * (i + 1)`. Any other failure
/// is returned immediately. When retries run out, the last failing result is
/// returned.
pub async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    url: &str,
    options: &FetchOptions,
    max_retries: u32,
    backoff_unit: Duration,
) -> FetchResult {
    let attempts = max_retries.max(1);
    let mut attempt = 0;

    loop {
        let result = fetcher.fetch(url, options).await;

        if result.success || !result.is_rate_limited() {
            return result;
        }

        attempt += 1;
        if attempt >= attempts {
            tracing::warn!("Giving up on {} after {} rate-limited attempts", url, attempts);
            return result;
        }

        let wait = backoff_unit * attempt;
        tracing::info!(
            "Rate limit hit for {}. Retrying in {:?} (attempt {}/{})",
            url,
            wait,
            attempt + 1,
            attempts
        );
        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Returns the queued results in order, repeating the last one
    struct ScriptedFetcher {
        results: Vec<FetchResult>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, _url: &str, _options: &FetchOptions) -> FetchResult {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.results[n.min(self.results.len() - 1)].clone()
        }
    }

    fn options() -> FetchOptions {
        let config = CrawlerConfig {
            mean_delay_ms: 0,
            jitter_range_ms: 0,
            ..Default::default()
        };
        FetchOptions::from_config(&config, "test_session")
    }

    fn rate_limited() -> FetchResult {
        FetchResult::failed(
            "https://example.org/",
            "Error: rate limit reached for model llama in organization",
        )
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let fetcher = ScriptedFetcher {
            results: vec![
                rate_limited(),
                rate_limited(),
                FetchResult::ok("https://example.org/", "# ok"),
            ],
            calls: AtomicUsize::new(0),
        };

        let result = fetch_with_retry(
            &fetcher,
            "https://example.org/",
            &options(),
            3,
            Duration::from_millis(1),
        )
        .await;

        assert!(result.success);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_failure() {
        let fetcher = ScriptedFetcher {
            results: vec![rate_limited()],
            calls: AtomicUsize::new(0),
        };

        let result = fetch_with_retry(
            &fetcher,
            "https://example.org/",
            &options(),
            3,
            Duration::from_millis(1),
        )
        .await;

        assert!(!result.success);
        assert!(result.is_rate_limited());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_failures_are_not_retried() {
        let fetcher = ScriptedFetcher {
            results: vec![FetchResult::failed("https://example.org/", "HTTP 500")],
            calls: AtomicUsize::new(0),
        };

        let result = fetch_with_retry(
            &fetcher,
            "https://example.org/",
            &options(),
            3,
            Duration::from_millis(1),
        )
        .await;

        assert!(!result.success);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_http_fetch_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301)
                    .insert_header("Location", format!("{}/new", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body><h1>Respite Care</h1></body></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&CrawlerConfig::default()).unwrap();
        let result = fetcher
            .fetch(&format!("{}/old", server.uri()), &options())
            .await;

        assert!(result.success);
        assert_eq!(result.url, format!("{}/new", server.uri()));
        assert!(result.markdown.contains("# Respite Care"));
    }

    #[tokio::test]
    async fn test_http_429_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&CrawlerConfig::default()).unwrap();
        let result = fetcher.fetch(&server.uri(), &options()).await;

        assert!(result.is_rate_limited());
        assert_eq!(result.status_code, Some(429));
    }

    #[tokio::test]
    async fn test_cache_serves_repeat_fetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<p>Adult day care</p>", "text/html"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&CrawlerConfig::default()).unwrap();
        let mut opts = options();
        opts.cache_mode = CacheMode::Enabled;
        let url = format!("{}/page", server.uri());

        let first = fetcher.fetch(&url, &opts).await;
        let second = fetcher.fetch(&url, &opts).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrency_cap_serializes_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<p>Respite</p>", "text/html")
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&CrawlerConfig::default()).unwrap();
        let mut opts = options();
        opts.concurrency_cap = 1;
        let a = format!("{}/a", server.uri());
        let b = format!("{}/b", server.uri());

        let started = std::time::Instant::now();
        let (first, second) = tokio::join!(fetcher.fetch(&a, &opts), fetcher.fetch(&b, &opts));

        assert!(first.success && second.success);
        assert!(started.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_request() {
        let fetcher = HttpFetcher::new(&CrawlerConfig::default()).unwrap();
        let result = fetcher.fetch("not a url", &options()).await;
        assert!(!result.success);
    }
}
