use crate::config::types::{Config, CrawlerConfig, ExtractionConfig, LlmConfig, OutputConfig};
use crate::model::ResourceField;
use crate::url::normalize_url;
use crate::ConfigError;
use url::Url;

/// Upper bound on secondary-link hops; deeper trees multiply LLM calls quickly
const MAX_ALLOWED_DEPTH: u32 = 5;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_extraction_config(&config.extraction)?;
    validate_llm_config(&config.llm)?;
    validate_output_config(&config.output)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_depth > MAX_ALLOWED_DEPTH {
        return Err(ConfigError::Validation(format!(
            "max_depth must be <= {}, got {}",
            MAX_ALLOWED_DEPTH, config.max_depth
        )));
    }

    if config.max_secondary_links < 1 {
        return Err(ConfigError::Validation(format!(
            "max_secondary_links must be >= 1, got {}",
            config.max_secondary_links
        )));
    }

    if !(1..=5).contains(&config.max_ranked_links) {
        return Err(ConfigError::Validation(format!(
            "max_ranked_links must be between 1 and 5, got {}",
            config.max_ranked_links
        )));
    }

    if config.max_fetch_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_fetch_retries must be >= 1, got {}",
            config.max_fetch_retries
        )));
    }

    if config.concurrency_cap < 1 || config.concurrency_cap > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency_cap must be between 1 and 100, got {}",
            config.concurrency_cap
        )));
    }

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch_timeout_secs must be >= 1".to_string(),
        ));
    }

    if let Some(selector) = &config.css_selector {
        if scraper::Selector::parse(selector).is_err() {
            return Err(ConfigError::Validation(format!(
                "css_selector '{}' is not a valid CSS selector",
                selector
            )));
        }
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates extraction policy
fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    for key in &config.required_keys {
        if key.parse::<ResourceField>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Unknown required key '{}'",
                key
            )));
        }
    }

    if !(config.min_field_ratio > 0.0 && config.min_field_ratio <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "min_field_ratio must be in (0, 1], got {}",
            config.min_field_ratio
        )));
    }

    Ok(())
}

/// Validates LLM provider settings
fn validate_llm_config(config: &LlmConfig) -> Result<(), ConfigError> {
    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm model cannot be empty".to_string()));
    }

    if config.api_key_env.trim().is_empty() {
        return Err(ConfigError::Validation(
            "llm api_key_env cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid llm base_url: {}", e)))?;

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "llm timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_content_chars < 1000 {
        return Err(ConfigError::Validation(format!(
            "llm max_content_chars must be >= 1000, got {}",
            config.max_content_chars
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "data_dir cannot be empty".to_string(),
        ));
    }

    if config.provider_file.is_empty() {
        return Err(ConfigError::Validation(
            "provider_file cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates configured seed URLs
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        normalize_url(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Seed URL '{}': {}", seed, e)))?;
    }

    Ok(())
}
