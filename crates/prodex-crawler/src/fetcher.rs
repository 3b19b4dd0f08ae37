//! Page fetching with rate limiting, retries, and optional JS rendering.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::error::CrawlerError;
use crate::filter::ContentFilter;
use crate::rate_limit::RateLimiter;
use crate::render::{PageRenderer, RenderOptions, RenderWait};
use crate::retry::{RetryHandler, RetryPolicy, RetryPredicate};
use crate::types::CrawlResult;

/// Fetcher configuration; see [`prodex_core::AppConfig`] for the
/// environment-driven defaults.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Requests per minute for this fetcher instance.
    pub rate_limit: u32,
    /// Whether every crawl goes through the JS renderer by default.
    pub js_enabled: bool,
    pub headless: bool,
    pub retry: RetryPolicy,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "prodex/0.1 (product-extraction)".to_owned(),
            timeout: Duration::from_secs(60),
            rate_limit: 10,
            js_enabled: false,
            headless: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl FetcherConfig {
    #[must_use]
    pub fn from_app_config(config: &prodex_core::AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_millis(config.request_timeout_ms),
            rate_limit: config.rate_limit,
            js_enabled: config.js_rendering,
            headless: config.headless,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: Duration::from_secs_f64(config.retry_base_delay_secs),
                ..RetryPolicy::default()
            },
        }
    }
}

/// Per-crawl options.
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Use the JS renderer even when the fetcher default is plain HTTP.
    pub force_js: bool,
    /// Override the renderer wait conditions for this crawl.
    pub wait: Option<RenderWait>,
}

/// Fetches product pages and reduces them through the configured filters.
///
/// Rate limiting serialises fetch start times per instance; clones share
/// the same limiter and retry state. Failures are encoded in the returned
/// [`CrawlResult`] rather than raised, so callers (and the retry handler in
/// between) always have a value to inspect.
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
    config: FetcherConfig,
    rate_limiter: Arc<RateLimiter>,
    retry: Arc<RetryHandler>,
    filters: Vec<ContentFilter>,
    renderer: Option<Arc<dyn PageRenderer>>,
}

impl PageFetcher {
    /// Builds a fetcher from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlerError::Config`] for a zero rate limit and
    /// [`CrawlerError::Http`] if the HTTP client cannot be constructed.
    pub fn new(config: FetcherConfig) -> Result<Self, CrawlerError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .build()?;
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit)?);
        let retry = Arc::new(RetryHandler::new(config.retry.clone()));
        Ok(Self {
            client,
            config,
            rate_limiter,
            retry,
            filters: Vec::new(),
            renderer: None,
        })
    }

    /// Attaches content filters applied to every successful crawl.
    #[must_use]
    pub fn with_filters(mut self, filters: Vec<ContentFilter>) -> Self {
        self.filters = filters;
        self
    }

    /// Attaches the JS renderer used when rendering is enabled or forced.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Replaces the default retry condition.
    #[must_use]
    pub fn with_retry_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.retry = Arc::new(
            RetryHandler::new(self.config.retry.clone()).with_predicate(predicate),
        );
        self
    }

    /// A fetcher sharing this one's client and limiter but carrying extra
    /// filters for a single extraction.
    #[must_use]
    pub fn with_additional_filters(&self, extra: &[ContentFilter]) -> Self {
        let mut fetcher = self.clone();
        fetcher.filters.extend_from_slice(extra);
        fetcher
    }

    #[must_use]
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Crawls `url` with default options.
    pub async fn crawl(&self, url: &str) -> CrawlResult {
        self.crawl_with(url, &CrawlOptions::default()).await
    }

    /// Crawls `url`, retrying per the configured policy. Rate limiting is
    /// applied before every attempt; the fetches themselves overlap freely
    /// across tasks once released.
    pub async fn crawl_with(&self, url: &str, options: &CrawlOptions) -> CrawlResult {
        let use_js = self.config.js_enabled || options.force_js;

        let outcome = self
            .retry
            .execute(|| async {
                self.rate_limiter.acquire().await;
                if use_js {
                    tracing::info!(url, "crawling with JS rendering");
                    self.crawl_with_js(url, options).await
                } else {
                    tracing::info!(url, "crawling");
                    self.crawl_without_js(url).await
                }
            })
            .await;

        let max_retries = self.config.retry.max_retries;
        match outcome {
            Ok(mut result) => {
                result.retries = max_retries - self.retry.attempts_remaining();
                self.apply_filters(&mut result).await;
                result
            }
            Err(err) => {
                tracing::error!(url, error = %err, "crawl failed after retries");
                let mut result = CrawlResult::failure(url, err.to_string(), None);
                result.retries = max_retries - self.retry.attempts_remaining();
                result
            }
        }
    }

    async fn crawl_without_js(&self, url: &str) -> Result<CrawlResult, CrawlerError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Ok(CrawlResult::failure(
                url,
                format!("HTTP status {status}"),
                Some(status.as_u16()),
            ));
        }
        let body = response.text().await?;
        Ok(CrawlResult::success(url, body, Some(status.as_u16())))
    }

    async fn crawl_with_js(
        &self,
        url: &str,
        options: &CrawlOptions,
    ) -> Result<CrawlResult, CrawlerError> {
        let Some(renderer) = &self.renderer else {
            return Err(CrawlerError::RendererUnavailable {
                url: url.to_owned(),
            });
        };
        let render_options = RenderOptions {
            user_agent: self.config.user_agent.clone(),
            timeout: self.config.timeout,
            headless: self.config.headless,
            wait: options.wait.clone().unwrap_or_default(),
        };
        match renderer.render(url, &render_options).await {
            Ok(page) => {
                let mut result = CrawlResult::success(url, page.html, page.status);
                result.markdown = page.markdown;
                Ok(result)
            }
            // Render failures become an unsuccessful result so the retry
            // predicate — not an exception path — decides what happens next.
            Err(err @ CrawlerError::Render { .. }) => {
                tracing::warn!(url, error = %err, "page rendering failed");
                Ok(CrawlResult::failure(url, err.to_string(), None))
            }
            Err(err) => Err(err),
        }
    }

    /// Runs the configured filters over the fetched HTML and appends their
    /// fragments to `extracted_content`, with a header line before each
    /// named chain's output.
    async fn apply_filters(&self, result: &mut CrawlResult) {
        if self.filters.is_empty() || !result.success {
            return;
        }
        let Some(html) = result.html.clone() else {
            return;
        };
        for filter in &self.filters {
            match filter.apply(&html).await {
                Ok(fragments) if fragments.is_empty() => {}
                Ok(fragments) => {
                    if let ContentFilter::Chain(chain) = filter {
                        if let Some(name) = chain.name() {
                            result.extracted_content.push(format!("--- {name} ---"));
                        }
                    }
                    result.extracted_content.extend(fragments);
                }
                Err(err) => {
                    tracing::warn!(url = %result.url, error = %err, "content filter failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = FetcherConfig::default();
        assert_eq!(config.rate_limit, 10);
        assert!(!config.js_enabled);
        assert!(config.headless);
    }

    #[test]
    fn zero_rate_limit_fails_fetcher_construction() {
        let config = FetcherConfig {
            rate_limit: 0,
            ..FetcherConfig::default()
        };
        assert!(matches!(
            PageFetcher::new(config),
            Err(CrawlerError::Config(_))
        ));
    }
}
