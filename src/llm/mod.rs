//! LLM structured extraction
//!
//! This module contains everything that talks to the language model:
//! - The `LanguageModel` trait, the seam the crawler depends on
//! - An OpenAI-compatible HTTP implementation of it
//! - Strict JSON schema generation for response types
//! - The fixed prompts and the six extraction call sites

mod client;
mod extractor;
pub mod prompts;
mod schema;

pub use client::OpenAiCompatibleClient;
pub use extractor::{CallSite, Extractor, LlmUsage, SiteUsage, UsageReport};
pub use schema::StructuredOutput;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by language model calls
#[derive(Debug, Error)]
pub enum LlmError {
    /// Missing API key or invalid client settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failed or the request could not be sent
    #[error("Network error: {0}")]
    Network(String),

    /// The provider rejected the request because of a rate limit
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Non-2xx response other than a rate limit
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response did not match the requested schema
    #[error("Parse error: {0}")]
    Parse(String),

    /// The provider returned no content
    #[error("Empty response from model")]
    EmptyResponse,

    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Message fragment the provider sends when a model's rate limit is hit
pub const RATE_LIMIT_SIGNATURE: &str = "Rate limit reached for model";

/// Returns true if an error message carries the rate-limit signature
///
/// Matching ignores case, so `"rate limit reached for model"` also matches.
pub fn is_rate_limit_message(message: &str) -> bool {
    message
        .to_lowercase()
        .contains(&RATE_LIMIT_SIGNATURE.to_lowercase())
}

/// One structured-output request
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    /// Schema name; identifies the call site
    pub name: String,
    pub system: String,
    pub user: String,
    /// Strict JSON schema the response must follow
    pub schema: serde_json::Value,
}

/// Raw JSON text returned for a structured request
#[derive(Debug, Clone)]
pub struct StructuredResponse {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// Token counts reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// A model that can answer with JSON matching a schema
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete_structured(&self, request: StructuredRequest) -> LlmResult<StructuredResponse>;
}
