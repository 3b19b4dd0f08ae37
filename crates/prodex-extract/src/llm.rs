//! LLM extraction strategy.
//!
//! Sends the (optionally pre-filtered) page plus one of the fixed prompts
//! to the configured provider and parses its JSON reply into a product
//! record. Provider errors and malformed replies get exactly one retry,
//! after which the strategy degrades to the standard failure value — it
//! never fabricates placeholder data.

use std::sync::Arc;

use serde_json::Value;

use prodex_core::{LlmClient, LlmParams, ProductData};
use prodex_crawler::{ContentFilter, PageFetcher};

use crate::error::ExtractError;
use crate::normalize::normalize;
use crate::prompts::{FALLBACK_EXTRACTION_PROMPT, LLM_EXTRACTION_PROMPT, RESPONSE_SCHEMA};

#[derive(Clone)]
pub struct LlmExtractor {
    fetcher: PageFetcher,
    client: Arc<dyn LlmClient>,
    params: LlmParams,
}

impl LlmExtractor {
    #[must_use]
    pub fn new(fetcher: PageFetcher, client: Arc<dyn LlmClient>, params: LlmParams) -> Self {
        Self {
            fetcher,
            client,
            params,
        }
    }

    /// Fetches `url` and extracts via the provider; never raises. With
    /// `fallback` set, the free-form fallback prompt is used instead of the
    /// schema-guided one.
    pub async fn extract(
        &self,
        url: &str,
        fallback: bool,
        filters: &[ContentFilter],
    ) -> ProductData {
        tracing::info!(url, fallback, "extracting product data with LLM");
        let fetcher = if filters.is_empty() {
            self.fetcher.clone()
        } else {
            self.fetcher.with_additional_filters(filters)
        };
        let result = fetcher.crawl(url).await;
        let Some(html) = result.html.clone().filter(|_| result.success) else {
            tracing::error!(url, error = ?result.error, "failed to crawl page");
            return ProductData::failed(url, "Extraction Failed");
        };

        // Prefer filtered content when the crawl produced any.
        let content = result
            .extracted_content
            .first()
            .cloned()
            .unwrap_or(html);
        self.extract_from_html(&content, url, fallback).await
    }

    /// Extraction against already-fetched (or pre-filtered) content.
    pub async fn extract_from_html(&self, html: &str, url: &str, fallback: bool) -> ProductData {
        let base_prompt = if fallback {
            FALLBACK_EXTRACTION_PROMPT
        } else {
            LLM_EXTRACTION_PROMPT
        };
        let prompt = format!(
            "{base_prompt}\n\nSchema:\n{RESPONSE_SCHEMA}\n\nHTML:\n{html}\n\n\
             Reply with a single JSON object matching the schema."
        );

        // One retry on provider errors or malformed replies, then degrade.
        for attempt in 0..2u8 {
            match self.attempt(&prompt, url).await {
                Ok(product) => return product,
                Err(err) => {
                    tracing::warn!(url, attempt, error = %err, "LLM extraction attempt failed");
                }
            }
        }
        ProductData::failed(url, "LLM Extraction Failed")
    }

    async fn attempt(&self, prompt: &str, url: &str) -> Result<ProductData, ExtractError> {
        let reply = self.client.complete(prompt, &self.params).await?;
        let body = strip_code_fences(&reply);
        let value: Value = serde_json::from_str(body)
            .map_err(|e| ExtractError::Payload(format!("reply is not valid JSON: {e}")))?;
        let Value::Object(map) = value else {
            return Err(ExtractError::Payload(
                "reply is not a JSON object".to_owned(),
            ));
        };
        Ok(normalize(&map, url))
    }
}

fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
