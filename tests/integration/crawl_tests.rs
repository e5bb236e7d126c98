//! Integration tests for the crawler
//!
//! These tests use wiremock to serve pages (and, in one test, the chat
//! completions endpoint) and run full crawl jobs end-to-end with a scripted
//! language model.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use care_crawl::config::{Config, DedupScope};
use care_crawl::crawler::{Coordinator, HttpFetcher};
use care_crawl::llm::{
    LanguageModel, LlmError, LlmResult, OpenAiCompatibleClient, StructuredRequest,
    StructuredResponse,
};
use care_crawl::storage::CheckpointStore;
use care_crawl::{visit_key, CrawlError};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Canned LLM answers keyed by a marker that appears in the page text
#[derive(Clone, Default)]
struct Script {
    providers: Vec<(String, String)>,
    resources: Vec<(String, Vec<Value>)>,
    ranked: Vec<(String, Vec<String>)>,
}

impl Script {
    fn provider(mut self, marker: &str, name: &str) -> Self {
        self.providers.push((marker.to_string(), name.to_string()));
        self
    }

    fn resources(mut self, marker: &str, resources: Vec<Value>) -> Self {
        self.resources.push((marker.to_string(), resources));
        self
    }

    fn ranked(mut self, marker: &str, urls: Vec<String>) -> Self {
        self.ranked.push((marker.to_string(), urls));
        self
    }

    /// Answer for one structured call; `None` makes the call fail
    fn answer(&self, schema_name: &str, user: &str) -> Option<Value> {
        match schema_name {
            "care_provider" => {
                let name = self
                    .providers
                    .iter()
                    .find(|(marker, _)| user.contains(marker.as_str()))
                    .map(|(_, name)| name.clone());
                Some(json!({
                    "provider_name": name,
                    "resource_category": null, "city": null, "state": null,
                    "country": null, "zip": null, "address": null,
                    "phone": null, "email": null, "website": null
                }))
            }
            "care_resources" => {
                let resources = self
                    .resources
                    .iter()
                    .find(|(marker, _)| user.contains(marker.as_str()))
                    .map(|(_, resources)| resources.clone())
                    .unwrap_or_default();
                Some(json!({ "resources": resources }))
            }
            "ranked_urls" => {
                let urls = self
                    .ranked
                    .iter()
                    .find(|(marker, _)| user.contains(marker.as_str()))
                    .map(|(_, urls)| urls.clone())
                    .unwrap_or_default();
                Some(json!({ "ranked_urls": urls }))
            }
            "resource_category" => Some(json!({
                "category": "Support & Education",
                "subcategory": "Caregiver Support Groups"
            })),
            "resource_tag" => Some(json!({ "tag": "social_support" })),
            _ => None,
        }
    }
}

/// In-process model that answers from a [`Script`] and records call names
struct ScriptedModel {
    script: Script,
    calls: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls_named(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete_structured(&self, request: StructuredRequest) -> LlmResult<StructuredResponse> {
        self.calls.lock().unwrap().push(request.name.clone());
        match self.script.answer(&request.name, &request.user) {
            Some(value) => Ok(StructuredResponse {
                content: value.to_string(),
                usage: None,
            }),
            None => Err(LlmError::Api {
                status: 500,
                message: format!("no scripted answer for {}", request.name),
            }),
        }
    }
}

/// Serves a [`Script`] as an OpenAI-compatible chat completions endpoint
struct ChatResponder(Script);

impl Respond for ChatResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let name = body["response_format"]["json_schema"]["name"]
            .as_str()
            .unwrap_or_default();
        let user = body["messages"][1]["content"].as_str().unwrap_or_default();

        match self.0.answer(name, user) {
            Some(answer) => ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": answer.to_string() } }],
                "usage": { "prompt_tokens": 100, "completion_tokens": 20, "total_tokens": 120 }
            })),
            None => ResponseTemplate::new(500).set_body_string("no scripted answer"),
        }
    }
}

/// A record dense enough to stop secondary crawling
fn rich(name: &str) -> Value {
    json!({
        "resource_name": name,
        "description": "Meets every week for caregivers of people living with dementia.",
        "state": "OR",
        "age_range": "Adults",
        "eligibility": "Family caregivers",
        "format": "In-person",
        "languages": ["English", "Spanish"],
        "cost_tier": "FreeOrLowCost"
    })
}

/// A record with a name and nothing else
fn sparse(name: &str) -> Value {
    json!({ "resource_name": name })
}

/// Creates a test configuration writing under `data_dir` with no delays
fn create_test_config(data_dir: &Path) -> Config {
    let mut config = Config::default();
    config.crawler.politeness_delay_ms = 0;
    config.crawler.mean_delay_ms = 0;
    config.crawler.jitter_range_ms = 0;
    config.crawler.retry_backoff_secs = 0;
    config.crawler.fetch_timeout_secs = 5;
    config.llm.timeout_secs = 5;
    config.output.data_dir = data_dir.display().to_string();
    config
}

fn coordinator(config: Config, model: Arc<ScriptedModel>) -> Coordinator {
    let fetcher = HttpFetcher::new(&config.crawler).expect("Failed to build fetcher");
    Coordinator::new(config, Arc::new(fetcher), model)
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    "<html><head><title>Test</title></head><body>{}</body></html>",
                    body
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Number of requests the server received for `route`
async fn hits(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

#[tokio::test]
async fn test_complete_seed_yields_single_row() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    let data_dir = TempDir::new().unwrap();

    mount_page(
        &server,
        "/a",
        r#"<h1>Caregiver groups</h1><p>[[alpha]] Tuesday Support Group meets weekly.</p>
        <a href="/a/more">More groups</a>"#,
    )
    .await;
    mount_page(&server, "/a/more", "<p>[[alpha-more]]</p>").await;

    let seed = format!("{}/a", base_url);
    let script = Script::default()
        .provider("[[alpha]]", "Helping Families")
        .resources("[[alpha]]", vec![rich("Tuesday Support Group")])
        .ranked("[[alpha]]", vec![format!("{}/a/more", base_url)]);
    let model = Arc::new(ScriptedModel::new(script));

    let report = coordinator(create_test_config(data_dir.path()), model.clone())
        .run(&[seed.clone()])
        .await
        .expect("Crawl failed");

    assert_eq!(report.resources.len(), 1);
    let resource = &report.resources[0];
    assert_eq!(resource.resource_name, "Tuesday Support Group");
    assert_eq!(resource.source_url.as_deref(), Some(seed.as_str()));
    assert_eq!(resource.provider_name.as_deref(), Some("Helping Families"));
    assert_eq!(resource.resource_category.as_deref(), Some("Support & Education"));

    // Complete page: no ranking, no secondary fetch
    assert_eq!(model.calls_named("ranked_urls"), 0);
    assert_eq!(hits(&server, "/a/more").await, 0);
    assert_eq!(hits(&server, "/a").await, 1);

    assert_eq!(report.providers.len(), 1);
    assert_eq!(report.providers[0].website.as_deref(), Some(seed.as_str()));
    assert_eq!(report.providers[0].resources.len(), 1);
    assert_eq!(report.stats.seeds_with_resources, 1);
}

#[tokio::test]
async fn test_sparse_seed_descends_into_ranked_links() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    let data_dir = TempDir::new().unwrap();

    mount_page(
        &server,
        "/b",
        r#"<p>[[bravo]] Programs for caregivers</p>
        <a href="/b1">Meals</a> <a href="/b2">Rides</a>"#,
    )
    .await;
    mount_page(&server, "/b1", "<p>[[bravo-1]] Meal Program delivers lunch</p>").await;
    mount_page(&server, "/b2", "<p>[[bravo-2]] Nothing to see</p>").await;

    let seed = format!("{}/b", base_url);
    let b1 = format!("{}/b1", base_url);
    let script = Script::default()
        .resources("[[bravo-1]]", vec![rich("Meal Program")])
        .ranked("[[bravo]]", vec![b1.clone(), format!("{}/b2", base_url)]);
    let model = Arc::new(ScriptedModel::new(script));

    let report = coordinator(create_test_config(data_dir.path()), model)
        .run(&[seed.clone()])
        .await
        .expect("Crawl failed");

    assert_eq!(report.resources.len(), 1);
    assert_eq!(report.resources[0].resource_name, "Meal Program");
    assert_eq!(report.resources[0].source_url.as_deref(), Some(b1.as_str()));

    assert!(report.crawled_urls.contains(&visit_key(&seed)));
    assert!(report.crawled_urls.contains(&visit_key(&b1)));
    assert_eq!(hits(&server, "/b").await, 1);
    assert_eq!(hits(&server, "/b1").await, 1);
    assert_eq!(report.stats.secondary_crawls, 1);

    // The provider comes from the seed page and owns the child's resource
    assert_eq!(report.providers[0].website.as_deref(), Some(seed.as_str()));
    assert_eq!(report.providers[0].resources.len(), 1);
}

#[tokio::test]
async fn test_secondary_links_capped_and_depth_bounded() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    let data_dir = TempDir::new().unwrap();

    mount_page(&server, "/hub", "<p>[[hub]] Directory</p>").await;
    for i in 0..8 {
        mount_page(&server, &format!("/leaf{}", i), "<p>[[leaf]] Empty page</p>").await;
    }
    mount_page(&server, "/deep", "<p>[[deep]]</p>").await;

    let leaves: Vec<String> = (0..8).map(|i| format!("{}/leaf{}", base_url, i)).collect();
    let script = Script::default()
        .ranked("[[hub]]", leaves)
        .ranked("[[leaf]]", vec![format!("{}/deep", base_url)]);
    let model = Arc::new(ScriptedModel::new(script));

    let mut config = create_test_config(data_dir.path());
    config.crawler.max_depth = 1;
    config.crawler.max_secondary_links = 3;

    let report = coordinator(config, model)
        .run(&[format!("{}/hub", base_url)])
        .await
        .expect("Crawl failed");

    let mut leaf_hits = 0;
    for i in 0..8 {
        leaf_hits += hits(&server, &format!("/leaf{}", i)).await;
    }
    assert_eq!(leaf_hits, 3);
    assert_eq!(hits(&server, "/deep").await, 0);
    assert_eq!(report.crawled_urls.len(), 4);
    assert!(report.resources.is_empty());
    assert!(report.output_path.is_none());
}

#[tokio::test]
async fn test_failed_seed_does_not_stop_job() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    let data_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_page(&server, "/a", "<p>[[alpha]] Tuesday Support Group</p>").await;

    let script = Script::default().resources("[[alpha]]", vec![rich("Tuesday Support Group")]);
    let model = Arc::new(ScriptedModel::new(script));

    let report = coordinator(create_test_config(data_dir.path()), model)
        .run(&[format!("{}/missing", base_url), format!("{}/a", base_url)])
        .await
        .expect("Crawl failed");

    assert_eq!(report.stats.fetch_failures, 1);
    assert_eq!(report.stats.pages_fetched, 1);
    assert_eq!(report.resources.len(), 1);
    assert_eq!(report.providers.len(), 1);
}

#[tokio::test]
async fn test_resource_names_unique_across_seeds() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    let data_dir = TempDir::new().unwrap();

    mount_page(&server, "/one", "<p>[[one]] Tuesday Support Group</p>").await;
    mount_page(&server, "/two", "<p>[[two]] Tuesday Support Group again</p>").await;

    let script = Script::default()
        .resources("[[one]]", vec![rich("Tuesday Support Group")])
        .resources(
            "[[two]]",
            vec![rich("Tuesday Support Group"), rich("Memory Cafe")],
        );
    let seeds = vec![format!("{}/one", base_url), format!("{}/two", base_url)];

    let job_scoped = coordinator(
        create_test_config(data_dir.path()),
        Arc::new(ScriptedModel::new(script.clone())),
    )
    .run(&seeds)
    .await
    .expect("Crawl failed");

    let names: Vec<&str> = job_scoped
        .resources
        .iter()
        .map(|r| r.resource_name.as_str())
        .collect();
    assert_eq!(names, vec!["Tuesday Support Group", "Memory Cafe"]);
    assert_eq!(
        job_scoped.resources[0].source_url,
        Some(format!("{}/one", base_url))
    );

    let mut config = create_test_config(data_dir.path());
    config.extraction.dedup_scope = DedupScope::Seed;
    let seed_scoped = coordinator(config, Arc::new(ScriptedModel::new(script)))
        .run(&seeds)
        .await
        .expect("Crawl failed");
    assert_eq!(seed_scoped.resources.len(), 3);
}

#[tokio::test]
async fn test_duplicate_observations_are_merged() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    let data_dir = TempDir::new().unwrap();

    mount_page(&server, "/grants", "<p>[[grants]] Respite Grant</p>").await;
    mount_page(&server, "/grants/apply", "<p>[[apply]] Respite Grant details</p>").await;

    // No merge answer is scripted, so the deterministic merge is used
    let script = Script::default()
        .resources("[[grants]]", vec![sparse("Respite Grant")])
        .resources("[[apply]]", vec![rich("Respite Grant")])
        .ranked("[[grants]]", vec![format!("{}/grants/apply", base_url)]);
    let model = Arc::new(ScriptedModel::new(script));

    let report = coordinator(create_test_config(data_dir.path()), model.clone())
        .run(&[format!("{}/grants", base_url)])
        .await
        .expect("Crawl failed");

    assert_eq!(model.calls_named("merged_resources"), 1);
    assert_eq!(report.stats.duplicate_buckets, 1);
    assert_eq!(report.resources.len(), 1);

    let merged = &report.resources[0];
    assert_eq!(merged.resource_name, "Respite Grant");
    assert!(merged.description.is_some());
    assert_eq!(merged.languages, vec!["English", "Spanish"]);
    // The seed page was seen first and stays the record's source
    assert_eq!(merged.source_url.as_deref(), Some(format!("{}/grants", base_url).as_str()));
}

#[tokio::test]
async fn test_csv_export_and_checkpoints() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    let data_dir = TempDir::new().unwrap();

    mount_page(&server, "/a", "<p>[[alpha]] Tuesday Support Group</p>").await;
    let seed = format!("{}/a", base_url);
    let script = Script::default()
        .provider("[[alpha]]", "Helping Families")
        .resources("[[alpha]]", vec![rich("Tuesday Support Group")]);

    let config = create_test_config(data_dir.path());
    let store = CheckpointStore::from_config(&config.output);
    let report = coordinator(config, Arc::new(ScriptedModel::new(script)))
        .with_output_file("groups.csv")
        .run(&[seed.clone()])
        .await
        .expect("Crawl failed");

    let csv_path = report.output_path.expect("CSV should be written");
    assert_eq!(csv_path, data_dir.path().join("groups.csv"));

    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 1);

    let column = |name: &str| headers.iter().position(|h| h == name).unwrap();
    assert_eq!(headers.get(0), Some("provider_name"));
    assert_eq!(&rows[0][column("resource_name")], "Tuesday Support Group");
    assert_eq!(&rows[0][column("languages")], "English, Spanish");
    assert_eq!(&rows[0][column("source_url")], seed.as_str());
    let added = &rows[0][column("date_added_to_db")];
    assert!(chrono::DateTime::parse_from_rfc3339(added).is_ok());

    let step = store.read_step(&seed).expect("Checkpoint should be readable");
    assert_eq!(step.url, seed);
    assert_eq!(step.depth, 0);
    assert_eq!(step.session_id, report.session_id);
    assert!(step.fetch.success);
    assert_eq!(step.candidates.len(), 1);
    assert_eq!(
        step.provider.and_then(|p| p.provider_name).as_deref(),
        Some("Helping Families")
    );

    let providers = store.read_providers().expect("Provider aggregate should be readable");
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].resources.len(), 1);
    assert_eq!(report.provider_path, Some(store.provider_path().to_path_buf()));
}

#[tokio::test]
async fn test_end_to_end_over_chat_completions() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    let data_dir = TempDir::new().unwrap();

    mount_page(&server, "/a", "<p>[[alpha]] Tuesday Support Group</p>").await;
    let script = Script::default()
        .provider("[[alpha]]", "Helping Families")
        .resources("[[alpha]]", vec![rich("Tuesday Support Group")]);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ChatResponder(script))
        .mount(&server)
        .await;

    let config = create_test_config(data_dir.path());
    let fetcher = HttpFetcher::new(&config.crawler).unwrap();
    let client = OpenAiCompatibleClient::new("test-key", "test-model")
        .with_base_url(format!("{}/v1", base_url));

    let report = Coordinator::new(config, Arc::new(fetcher), Arc::new(client))
        .run(&[format!("{}/a", base_url)])
        .await
        .expect("Crawl failed");

    assert_eq!(report.resources.len(), 1);
    assert_eq!(report.resources[0].resource_name, "Tuesday Support Group");

    // provider, resources, category, tag
    let usage = report.stats.llm_usage.expect("Usage should be reported");
    assert_eq!(usage.total_calls(), 4);
    assert_eq!(usage.total_failures(), 0);
    assert_eq!(usage.total_tokens(), 480);
}

#[tokio::test]
async fn test_empty_seed_list_is_fatal() {
    let data_dir = TempDir::new().unwrap();
    let model = Arc::new(ScriptedModel::new(Script::default()));

    let result = coordinator(create_test_config(data_dir.path()), model.clone())
        .run(&[])
        .await;

    assert!(matches!(result, Err(CrawlError::NoSeeds)));
    assert!(model.calls.lock().unwrap().is_empty());
}
