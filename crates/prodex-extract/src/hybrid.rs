//! Hybrid extraction: run several strategies over one fetched page, fall
//! back in order, and optionally merge the successful results.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value};

use prodex_core::{now_rfc3339, LlmClient, LlmParams, ProductData};
use prodex_crawler::{ContentFilter, PageFetcher};

use crate::auto::AutoExtractor;
use crate::css::{CssExtractor, SelectorConfig};
use crate::llm::LlmExtractor;
use crate::schema::SchemaGenerator;
use crate::xpath::{XPathConfig, XPathExtractor};

/// One extraction strategy. Merge priority is `Auto > Llm > Css > Xpath`
/// regardless of the caller-supplied execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Auto,
    Css,
    Xpath,
    Llm,
}

impl Strategy {
    /// Lower ranks win when merging.
    #[must_use]
    pub fn merge_rank(self) -> u8 {
        match self {
            Self::Auto => 0,
            Self::Llm => 1,
            Self::Css => 2,
            Self::Xpath => 3,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Css => "css",
            Self::Xpath => "xpath",
            Self::Llm => "llm",
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" | "auto_schema" => Ok(Self::Auto),
            "css" => Ok(Self::Css),
            "xpath" => Ok(Self::Xpath),
            "llm" => Ok(Self::Llm),
            other => Err(format!(
                "unknown extraction strategy \"{other}\": expected auto, css, xpath, or llm"
            )),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Hybrid orchestration options.
#[derive(Debug, Clone)]
pub struct HybridConfig {
    /// Strategies tried in this order.
    pub extraction_order: Vec<Strategy>,
    pub use_auto_schema: bool,
    pub use_fallback_llm: bool,
    /// Merge all successful results instead of returning the first.
    pub merge_results: bool,
    /// CSS selectors; defaults are used when absent.
    pub css_selectors: Option<SelectorConfig>,
    /// XPath expressions; defaults are used when absent.
    pub xpath_expressions: Option<XPathConfig>,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            extraction_order: vec![Strategy::Auto, Strategy::Css, Strategy::Xpath, Strategy::Llm],
            use_auto_schema: true,
            use_fallback_llm: true,
            merge_results: true,
            css_selectors: None,
            xpath_expressions: None,
        }
    }
}

/// Runs the configured strategies over a single fetch of the page.
#[derive(Clone)]
pub struct HybridExtractor {
    fetcher: PageFetcher,
    css: CssExtractor,
    xpath: XPathExtractor,
    auto: AutoExtractor,
    llm: Option<LlmExtractor>,
}

impl HybridExtractor {
    #[must_use]
    pub fn new(fetcher: PageFetcher, generator: Arc<SchemaGenerator>) -> Self {
        Self {
            css: CssExtractor::new(fetcher.clone()),
            xpath: XPathExtractor::new(fetcher.clone()),
            auto: AutoExtractor::new(fetcher.clone(), generator),
            llm: None,
            fetcher,
        }
    }

    /// Wires in the LLM strategy; without it, `llm` entries in the
    /// extraction order are skipped.
    #[must_use]
    pub fn with_llm(mut self, client: Arc<dyn LlmClient>, params: LlmParams) -> Self {
        self.llm = Some(LlmExtractor::new(self.fetcher.clone(), client, params));
        self
    }

    /// Extracts `url` with the configured strategy order; never raises.
    pub async fn extract(
        &self,
        url: &str,
        config: &HybridConfig,
        filters: &[ContentFilter],
    ) -> ProductData {
        tracing::info!(url, "extracting product data with hybrid approach");
        let fetcher = if filters.is_empty() {
            self.fetcher.clone()
        } else {
            self.fetcher.with_additional_filters(filters)
        };

        // One fetch feeds every strategy.
        let crawl = fetcher.crawl(url).await;
        let Some(html) = crawl.html.clone().filter(|_| crawl.success) else {
            tracing::error!(url, error = ?crawl.error, "failed to crawl page");
            return ProductData::failed(url, "Extraction Failed");
        };

        let mut successes: Vec<(Strategy, ProductData)> = Vec::new();

        for strategy in &config.extraction_order {
            let result = match strategy {
                Strategy::Css => {
                    let selectors = config
                        .css_selectors
                        .clone()
                        .unwrap_or_else(SelectorConfig::default_selectors);
                    Some(self.css.extract_from_html(&html, url, &selectors))
                }
                Strategy::Xpath => {
                    let expressions = config
                        .xpath_expressions
                        .clone()
                        .unwrap_or_else(XPathConfig::default_expressions);
                    Some(self.xpath.extract_from_html(&html, url, &expressions))
                }
                Strategy::Auto if config.use_auto_schema => {
                    Some(self.auto.extract_from_html(&html, url).await)
                }
                Strategy::Llm if config.use_fallback_llm => match &self.llm {
                    Some(llm) => Some(llm.extract_from_html(&html, url, false).await),
                    None => {
                        tracing::warn!(url, "LLM strategy requested but no provider configured");
                        None
                    }
                },
                _ => None,
            };

            let Some(result) = result else { continue };
            if result.extraction_success {
                tracing::info!(url, strategy = %strategy, "strategy succeeded");
                successes.push((*strategy, result));
                if !config.merge_results {
                    break;
                }
            } else {
                tracing::warn!(url, strategy = %strategy, "strategy did not succeed");
            }
        }

        if successes.is_empty() {
            tracing::error!(url, "all extraction strategies failed");
            return ProductData::failed(url, "Hybrid Extraction Failed");
        }
        if successes.len() == 1 || !config.merge_results {
            return successes.swap_remove(0).1;
        }
        merge_results(successes, url)
    }
}

/// Keys set fresh on the merged record rather than copied from inputs.
const METADATA_FIELDS: &[&str] = &["source", "extracted_at", "extraction_success", "raw_data"];

/// Merges successful strategy results by the priority rules: the
/// highest-priority result is the base; images union by URL, attributes
/// union by name, the richer price object wins (auto/llm on ties), and
/// longer free text replaces shorter.
fn merge_results(mut successes: Vec<(Strategy, ProductData)>, url: &str) -> ProductData {
    successes.sort_by_key(|(strategy, _)| strategy.merge_rank());

    let base = successes[0].1.clone();
    let Ok(Value::Object(mut merged)) = serde_json::to_value(&successes[0].1) else {
        return base;
    };

    for (strategy, product) in &successes[1..] {
        let Ok(Value::Object(incoming)) = serde_json::to_value(product) else {
            continue;
        };
        for (key, value) in incoming {
            if METADATA_FIELDS.contains(&key.as_str()) || is_empty_value(&value) {
                continue;
            }
            match key.as_str() {
                "images" => merge_record_list(&mut merged, &key, value, "url"),
                "attributes" => merge_record_list(&mut merged, &key, value, "name"),
                "price" => merge_price(&mut merged, value, *strategy),
                _ => merge_simple(&mut merged, &key, value),
            }
        }
    }

    merged.insert("source".to_owned(), Value::String(url.to_owned()));
    merged.insert("extracted_at".to_owned(), Value::String(now_rfc3339()));
    merged.insert("extraction_success".to_owned(), Value::Bool(true));

    match serde_json::from_value::<ProductData>(Value::Object(merged)) {
        Ok(product) => product,
        Err(err) => {
            tracing::error!(url, error = %err, "merged record failed to deserialize");
            base
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Union of record lists keyed on `key_field` (image URLs, attribute names).
fn merge_record_list(merged: &mut Map<String, Value>, field: &str, value: Value, key_field: &str) {
    let Value::Array(incoming) = value else {
        return;
    };
    let existing = merged
        .entry(field.to_owned())
        .or_insert_with(|| Value::Array(Vec::new()));
    let Value::Array(records) = existing else {
        return;
    };

    let mut seen: Vec<String> = records
        .iter()
        .filter_map(|r| r.get(key_field).and_then(Value::as_str).map(str::to_owned))
        .collect();
    for record in incoming {
        let Some(record_key) = record.get(key_field).and_then(Value::as_str) else {
            continue;
        };
        if seen.iter().any(|k| k == record_key) {
            continue;
        }
        seen.push(record_key.to_owned());
        records.push(record);
    }
}

/// The price object with more populated sub-fields wins; ties go to the
/// auto and LLM strategies.
fn merge_price(merged: &mut Map<String, Value>, value: Value, strategy: Strategy) {
    let incoming_count = filled_count(&value);
    let existing_count = merged.get("price").map_or(0, filled_count);
    let tie_break = matches!(strategy, Strategy::Auto | Strategy::Llm);
    if incoming_count > existing_count || (incoming_count == existing_count && tie_break) {
        merged.insert("price".to_owned(), value);
    }
}

fn filled_count(value: &Value) -> usize {
    value.as_object().map_or(0, |object| {
        object.values().filter(|v| !is_empty_value(v)).count()
    })
}

/// Absent fields are taken; present string fields keep the longer value.
fn merge_simple(merged: &mut Map<String, Value>, key: &str, value: Value) {
    let replace = match merged.get(key) {
        None => true,
        Some(existing) if is_empty_value(existing) => true,
        Some(Value::String(existing)) => {
            matches!(&value, Value::String(incoming) if incoming.len() > existing.len())
        }
        Some(_) => false,
    };
    if replace {
        merged.insert(key.to_owned(), value);
    }
}

#[cfg(test)]
#[path = "hybrid_test.rs"]
mod tests;
