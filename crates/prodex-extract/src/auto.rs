//! Auto-schema extraction strategy: generate (or reuse a cached) schema for
//! the page, then drive the CSS field engine with it.

use std::sync::Arc;

use prodex_core::ProductData;
use prodex_crawler::{ContentFilter, PageFetcher};

use crate::css::{extract_fields, SelectorConfig};
use crate::normalize::normalize;
use crate::schema::SchemaGenerator;

#[derive(Clone)]
pub struct AutoExtractor {
    fetcher: PageFetcher,
    generator: Arc<SchemaGenerator>,
}

impl AutoExtractor {
    #[must_use]
    pub fn new(fetcher: PageFetcher, generator: Arc<SchemaGenerator>) -> Self {
        Self { fetcher, generator }
    }

    /// Fetches `url`, generates a schema for it, and extracts; never raises.
    pub async fn extract(&self, url: &str, filters: &[ContentFilter]) -> ProductData {
        tracing::info!(url, "extracting product data with auto schema");
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

        // When filters reduced the page, the first fragment guides schema
        // generation; extraction still runs over the full page.
        let schema_html = result
            .extracted_content
            .first()
            .cloned()
            .unwrap_or_else(|| html.clone());
        self.extract_with_schema_html(&html, &schema_html, url).await
    }

    /// Extraction against already-fetched HTML.
    pub async fn extract_from_html(&self, html: &str, url: &str) -> ProductData {
        self.extract_with_schema_html(html, html, url).await
    }

    async fn extract_with_schema_html(
        &self,
        html: &str,
        schema_html: &str,
        url: &str,
    ) -> ProductData {
        let schema = match self.generator.generate(schema_html, Some(url)).await {
            Ok(schema) => schema,
            Err(err) => {
                tracing::error!(url, error = %err, "schema generation failed");
                return ProductData::failed(url, "Extraction Failed");
            }
        };

        let config = SelectorConfig::from_schema(&schema);
        let raw = extract_fields(html, &config);
        if raw.is_empty() {
            tracing::warn!(url, "generated schema matched nothing");
            return ProductData::failed(url, "Extraction Failed");
        }
        normalize(&raw, url)
    }
}
