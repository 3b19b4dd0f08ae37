//! CSS-selector extraction strategy.

use std::collections::BTreeMap;

use scraper::{Html, Selector};
use serde_json::{Map, Value};

use prodex_core::{parse_price, ExtractionSchema, ProductData};
use prodex_crawler::{ContentFilter, PageFetcher};

use crate::normalize::normalize;

/// Where and how to read one field.
#[derive(Debug, Clone)]
pub struct FieldSelector {
    pub selector: String,
    pub attribute: String,
    pub array: bool,
    /// Tried in order when the primary selector matches nothing.
    pub alternatives: Vec<String>,
}

impl FieldSelector {
    #[must_use]
    pub fn text(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attribute: "text".to_owned(),
            array: false,
            alternatives: Vec::new(),
        }
    }

    #[must_use]
    pub fn attr(selector: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            ..Self::text(selector)
        }
    }

    #[must_use]
    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }
}

/// Field selectors plus the special lookups that need paired sub-selectors.
#[derive(Debug, Clone, Default)]
pub struct SelectorConfig {
    pub fields: BTreeMap<String, FieldSelector>,
    /// Image elements, when `images` is not among `fields`.
    pub images_selector: Option<String>,
    /// Outer attribute rows; names and values are found inside each row.
    pub attributes_selector: Option<String>,
    pub attribute_name_selector: Option<String>,
    pub attribute_value_selector: Option<String>,
}

impl SelectorConfig {
    /// Default selectors covering the usual e-commerce markup.
    #[must_use]
    pub fn default_selectors() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            "title".to_owned(),
            FieldSelector::text("h1, .product-title, .product-name, [itemprop='name']"),
        );
        fields.insert(
            "price".to_owned(),
            FieldSelector::text(".price, .product-price, [itemprop='price'], .price-current"),
        );
        fields.insert(
            "description".to_owned(),
            FieldSelector::text(".product-description, [itemprop='description'], .description"),
        );
        fields.insert(
            "brand".to_owned(),
            FieldSelector::text(".product-brand, [itemprop='brand'], .brand"),
        );
        fields.insert(
            "sku".to_owned(),
            FieldSelector::text(".product-sku, [itemprop='sku'], .sku"),
        );
        fields.insert(
            "availability".to_owned(),
            FieldSelector::text(".availability, .stock, [itemprop='availability']"),
        );
        Self {
            fields,
            images_selector: Some("img.product-image, [itemprop='image'], .product-img".to_owned()),
            attributes_selector: Some(
                ".product-attributes li, .product-specs tr, .product-features div".to_owned(),
            ),
            attribute_name_selector: Some(".attribute-name, .spec-name, th".to_owned()),
            attribute_value_selector: Some(".attribute-value, .spec-value, td".to_owned()),
        }
    }

    /// Builds a selector config from a validated extraction schema,
    /// carrying over attributes, array flags, and alternative selectors.
    #[must_use]
    pub fn from_schema(schema: &ExtractionSchema) -> Self {
        let mut config = Self::default();
        for field in &schema.fields {
            if field.selector.is_empty() {
                continue;
            }
            config.fields.insert(
                field.name.clone(),
                FieldSelector {
                    selector: field.selector.clone(),
                    attribute: field.attribute.clone(),
                    array: field.array,
                    alternatives: field.alternative_selectors.clone(),
                },
            );
        }
        config
    }
}

/// Extracts product data by querying the DOM with CSS selectors.
#[derive(Clone)]
pub struct CssExtractor {
    fetcher: PageFetcher,
}

impl CssExtractor {
    #[must_use]
    pub fn new(fetcher: PageFetcher) -> Self {
        Self { fetcher }
    }

    /// Fetches `url` and extracts fields per `config`. Never raises: fetch
    /// or extraction failure yields a `ProductData` with
    /// `extraction_success = false`.
    pub async fn extract(
        &self,
        url: &str,
        config: &SelectorConfig,
        filters: &[ContentFilter],
    ) -> ProductData {
        tracing::info!(url, "extracting product data with CSS selectors");
        let fetcher = if filters.is_empty() {
            self.fetcher.clone()
        } else {
            self.fetcher.with_additional_filters(filters)
        };
        let result = fetcher.crawl(url).await;
        let Some(html) = result.html.filter(|_| result.success) else {
            tracing::error!(url, error = ?result.error, "failed to crawl page");
            return ProductData::failed(url, "Extraction Failed");
        };
        self.extract_from_html(&html, url, config)
    }

    /// Extraction against already-fetched HTML.
    #[must_use]
    pub fn extract_from_html(
        &self,
        html: &str,
        url: &str,
        config: &SelectorConfig,
    ) -> ProductData {
        let raw = extract_fields(html, config);
        if raw.is_empty() {
            return ProductData::failed(url, "Extraction Failed");
        }
        normalize(&raw, url)
    }
}

/// Runs every configured selector over `html` and returns the raw field map.
#[must_use]
pub fn extract_fields(html: &str, config: &SelectorConfig) -> Map<String, Value> {
    let document = Html::parse_document(html);
    let mut raw = Map::new();

    for (name, field) in &config.fields {
        let Some((elements, selector)) = select_with_alternatives(&document, field) else {
            continue;
        };
        tracing::debug!(field = %name, selector = %selector, "selector matched");

        if field.array {
            if name == "images" {
                let records: Vec<Value> = elements
                    .iter()
                    .filter_map(|el| {
                        read_value(*el, &field.attribute).map(|url| image_record(url, *el))
                    })
                    .collect();
                if !records.is_empty() {
                    raw.insert(name.clone(), Value::Array(records));
                }
            } else {
                let values: Vec<Value> = elements
                    .iter()
                    .filter_map(|el| read_value(*el, &field.attribute))
                    .map(Value::String)
                    .collect();
                if !values.is_empty() {
                    raw.insert(name.clone(), Value::Array(values));
                }
            }
        } else if let Some(element) = elements.first() {
            let Some(value) = read_value(*element, &field.attribute) else {
                continue;
            };
            match name.as_str() {
                "price" => {
                    let price = parse_price(&value);
                    if let Ok(price_value) = serde_json::to_value(&price) {
                        raw.insert(name.clone(), price_value);
                    }
                }
                "images" => {
                    raw.insert(
                        name.clone(),
                        Value::Array(vec![image_record(value, *element)]),
                    );
                }
                _ => {
                    raw.insert(name.clone(), Value::String(value));
                }
            }
        }
    }

    process_special_fields(&document, config, &mut raw);
    raw
}

/// Queries the primary selector, then each alternative, returning the first
/// non-empty match set.
fn select_with_alternatives<'a>(
    document: &'a Html,
    field: &FieldSelector,
) -> Option<(Vec<scraper::ElementRef<'a>>, String)> {
    let mut selectors = vec![field.selector.clone()];
    selectors.extend(field.alternatives.iter().cloned());

    for selector_str in selectors {
        let Ok(selector) = Selector::parse(&selector_str) else {
            tracing::warn!(selector = %selector_str, "skipping invalid selector");
            continue;
        };
        let elements: Vec<scraper::ElementRef<'a>> = document.select(&selector).collect();
        if !elements.is_empty() {
            return Some((elements, selector_str));
        }
    }
    None
}

fn read_value(element: scraper::ElementRef<'_>, attribute: &str) -> Option<String> {
    let value = if attribute == "text" {
        element_text(element)
    } else {
        element.value().attr(attribute).unwrap_or("").trim().to_owned()
    };
    (!value.is_empty()).then_some(value)
}

fn image_record(url: String, element: scraper::ElementRef<'_>) -> Value {
    let mut record = Map::new();
    record.insert("url".to_owned(), Value::String(url));
    if let Some(alt) = element.value().attr("alt") {
        if !alt.is_empty() {
            record.insert("alt_text".to_owned(), Value::String(alt.to_owned()));
        }
    }
    Value::Object(record)
}

fn process_special_fields(document: &Html, config: &SelectorConfig, raw: &mut Map<String, Value>) {
    if !raw.contains_key("images") {
        if let Some(images_selector) = &config.images_selector {
            if let Ok(selector) = Selector::parse(images_selector) {
                let records: Vec<Value> = document
                    .select(&selector)
                    .filter_map(|img| {
                        let src = img.value().attr("src").unwrap_or("");
                        (!src.is_empty()).then(|| image_record(src.to_owned(), img))
                    })
                    .collect();
                if !records.is_empty() {
                    raw.insert("images".to_owned(), Value::Array(records));
                }
            }
        }
    }

    if let Some(attributes_selector) = &config.attributes_selector {
        let name_selector = config
            .attribute_name_selector
            .as_deref()
            .unwrap_or(".attr-name");
        let value_selector = config
            .attribute_value_selector
            .as_deref()
            .unwrap_or(".attr-value");
        let (Ok(outer), Ok(names), Ok(values)) = (
            Selector::parse(attributes_selector),
            Selector::parse(name_selector),
            Selector::parse(value_selector),
        ) else {
            return;
        };

        let mut attributes = Vec::new();
        for row in document.select(&outer) {
            let name = row.select(&names).next().map(element_text);
            let value = row.select(&values).next().map(element_text);
            if let (Some(name), Some(value)) = (name, value) {
                if !name.is_empty() && !value.is_empty() {
                    let mut record = Map::new();
                    record.insert("name".to_owned(), Value::String(name));
                    record.insert("value".to_owned(), Value::String(value));
                    attributes.push(Value::Object(record));
                }
            }
        }
        if !attributes.is_empty() {
            raw.insert("attributes".to_owned(), Value::Array(attributes));
        }
    }
}

/// Element text with script/style content stripped and whitespace trimmed.
pub(crate) fn element_text(element: scraper::ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out.trim().to_owned()
}

fn collect_text(element: scraper::ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = scraper::ElementRef::wrap(child) {
            let name = child_element.value().name();
            if name != "script" && name != "style" {
                collect_text(child_element, out);
            }
        }
    }
}

#[cfg(test)]
#[path = "css_test.rs"]
mod tests;
