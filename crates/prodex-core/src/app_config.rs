use std::path::PathBuf;

use crate::llm::LlmParams;

/// Application configuration for the extraction pipeline.
///
/// Loaded from `PRODEX_*` environment variables via
/// [`crate::config::load_app_config`]; every field has a sensible default
/// except the LLM API key, which stays optional (the pipeline degrades to
/// heuristic-only operation without it).
#[derive(Clone)]
pub struct AppConfig {
    /// Requests per minute enforced by each fetcher's rate limiter.
    pub rate_limit: u32,
    pub user_agent: String,
    /// Per-request timeout in milliseconds (HTTP and page rendering).
    pub request_timeout_ms: u64,
    /// Whether fetches go through a JS renderer by default.
    pub js_rendering: bool,
    pub headless: bool,
    pub max_retries: u32,
    pub retry_base_delay_secs: f64,
    pub storage_dir: PathBuf,
    pub schema_cache_dir: PathBuf,
    pub log_level: String,
    pub llm_provider: String,
    pub llm: LlmParams,
    pub llm_api_key: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("rate_limit", &self.rate_limit)
            .field("user_agent", &self.user_agent)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("js_rendering", &self.js_rendering)
            .field("headless", &self.headless)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_secs", &self.retry_base_delay_secs)
            .field("storage_dir", &self.storage_dir)
            .field("schema_cache_dir", &self.schema_cache_dir)
            .field("log_level", &self.log_level)
            .field("llm_provider", &self.llm_provider)
            .field("llm", &self.llm)
            .field(
                "llm_api_key",
                &self.llm_api_key.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}
