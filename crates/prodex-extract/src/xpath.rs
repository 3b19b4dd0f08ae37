//! XPath extraction strategy.
//!
//! Same contract as the CSS extractor, driven by XPath expressions over the
//! supported translation subset (see [`prodex_crawler::translate_xpath`]).
//! Attribute name/value sub-lookups inside attribute rows use plain CSS,
//! since those selectors are fixed structural probes rather than
//! caller-supplied expressions.

use std::collections::BTreeMap;

use scraper::{Html, Selector};
use serde_json::{Map, Value};

use prodex_core::{parse_price, ProductData};
use prodex_crawler::{translate_xpath, ContentFilter, PageFetcher, XPathQuery};

use crate::css::element_text;
use crate::normalize::normalize;

/// One field's XPath expression.
#[derive(Debug, Clone)]
pub struct FieldXPath {
    pub expression: String,
    pub array: bool,
}

impl FieldXPath {
    #[must_use]
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            array: false,
        }
    }

    #[must_use]
    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }
}

/// XPath expressions per field plus the image/attribute special lookups.
#[derive(Debug, Clone, Default)]
pub struct XPathConfig {
    pub fields: BTreeMap<String, FieldXPath>,
    pub images_xpath: Option<String>,
    pub attributes_xpath: Option<String>,
    /// CSS probes applied inside each attribute row.
    pub attribute_name_selector: Option<String>,
    pub attribute_value_selector: Option<String>,
}

impl XPathConfig {
    /// Default expressions covering common e-commerce markup.
    #[must_use]
    pub fn default_expressions() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_owned(), FieldXPath::new("//h1"));
        fields.insert("price".to_owned(), FieldXPath::new("//*[@class='price']"));
        fields.insert(
            "description".to_owned(),
            FieldXPath::new("//*[@class='product-description']"),
        );
        fields.insert("brand".to_owned(), FieldXPath::new("//*[@class='brand']"));
        fields.insert("sku".to_owned(), FieldXPath::new("//*[@class='sku']"));
        fields.insert(
            "availability".to_owned(),
            FieldXPath::new("//*[@class='availability']"),
        );
        Self {
            fields,
            images_xpath: Some("//img[@class='product-image']".to_owned()),
            attributes_xpath: Some("//tr[@class='spec-row']".to_owned()),
            attribute_name_selector: Some("th, dt, .attr-name".to_owned()),
            attribute_value_selector: Some("td, dd, .attr-value".to_owned()),
        }
    }
}

/// Extracts product data by evaluating XPath expressions.
#[derive(Clone)]
pub struct XPathExtractor {
    fetcher: PageFetcher,
}

impl XPathExtractor {
    #[must_use]
    pub fn new(fetcher: PageFetcher) -> Self {
        Self { fetcher }
    }

    /// Fetches `url` and extracts fields per `config`; never raises.
    pub async fn extract(
        &self,
        url: &str,
        config: &XPathConfig,
        filters: &[ContentFilter],
    ) -> ProductData {
        tracing::info!(url, "extracting product data with XPath expressions");
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
    pub fn extract_from_html(&self, html: &str, url: &str, config: &XPathConfig) -> ProductData {
        let raw = extract_fields(html, config);
        if raw.is_empty() {
            return ProductData::failed(url, "Extraction Failed");
        }
        normalize(&raw, url)
    }
}

/// Evaluates every configured expression and returns the raw field map.
#[must_use]
pub fn extract_fields(html: &str, config: &XPathConfig) -> Map<String, Value> {
    let document = Html::parse_document(html);
    let mut raw = Map::new();

    for (name, field) in &config.fields {
        let Ok(query) = translate_xpath(&field.expression) else {
            tracing::warn!(expression = %field.expression, "skipping unsupported XPath");
            continue;
        };
        let values = evaluate(&document, &query);
        if values.is_empty() {
            continue;
        }

        if field.array {
            raw.insert(
                name.clone(),
                Value::Array(values.into_iter().map(Value::String).collect()),
            );
        } else {
            let value = values.into_iter().next().expect("non-empty");
            match name.as_str() {
                "price" => {
                    if let Ok(price_value) = serde_json::to_value(parse_price(&value)) {
                        raw.insert(name.clone(), price_value);
                    }
                }
                "images" => {
                    let mut record = Map::new();
                    record.insert("url".to_owned(), Value::String(value));
                    raw.insert(name.clone(), Value::Array(vec![Value::Object(record)]));
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

fn evaluate(document: &Html, query: &XPathQuery) -> Vec<String> {
    let Ok(selector) = Selector::parse(&query.css) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|element| {
            if let Some(attribute) = &query.attribute {
                element
                    .value()
                    .attr(attribute)
                    .map(|v| v.trim().to_owned())
            } else {
                Some(element_text(element))
            }
        })
        .filter(|value| !value.is_empty())
        .collect()
}

fn process_special_fields(document: &Html, config: &XPathConfig, raw: &mut Map<String, Value>) {
    if !raw.contains_key("images") {
        if let Some(images_xpath) = &config.images_xpath {
            if let Ok(query) = translate_xpath(images_xpath) {
                if let Ok(selector) = Selector::parse(&query.css) {
                    let records: Vec<Value> = document
                        .select(&selector)
                        .filter_map(|img| {
                            let src = img.value().attr("src")?;
                            if src.is_empty() {
                                return None;
                            }
                            let mut record = Map::new();
                            record.insert("url".to_owned(), Value::String(src.to_owned()));
                            if let Some(alt) = img.value().attr("alt") {
                                if !alt.is_empty() {
                                    record.insert(
                                        "alt_text".to_owned(),
                                        Value::String(alt.to_owned()),
                                    );
                                }
                            }
                            Some(Value::Object(record))
                        })
                        .collect();
                    if !records.is_empty() {
                        raw.insert("images".to_owned(), Value::Array(records));
                    }
                }
            }
        }
    }

    if let Some(attributes_xpath) = &config.attributes_xpath {
        let Ok(query) = translate_xpath(attributes_xpath) else {
            return;
        };
        let name_probe = config
            .attribute_name_selector
            .as_deref()
            .unwrap_or("th, dt, .attr-name");
        let value_probe = config
            .attribute_value_selector
            .as_deref()
            .unwrap_or("td, dd, .attr-value");
        let (Ok(outer), Ok(names), Ok(values)) = (
            Selector::parse(&query.css),
            Selector::parse(name_probe),
            Selector::parse(value_probe),
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

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
    <h1>Alpha Widget</h1>
    <div class="price">€19,90</div>
    <div class="product-description">A dependable widget.</div>
    <span class="brand">Acme</span>
    <img class="product-image" src="/img/front.jpg" alt="front">
    <table><tr class="spec-row"><th>Color</th><td>Black</td></tr></table>
    </body></html>"#;

    #[test]
    fn default_expressions_extract_the_basics() {
        let raw = extract_fields(PAGE, &XPathConfig::default_expressions());
        assert_eq!(raw.get("title"), Some(&Value::String("Alpha Widget".to_owned())));
        assert_eq!(raw.get("brand"), Some(&Value::String("Acme".to_owned())));
    }

    #[test]
    fn price_is_parsed_with_currency_detection() {
        let raw = extract_fields(PAGE, &XPathConfig::default_expressions());
        let price = raw.get("price").and_then(Value::as_object).expect("price");
        assert_eq!(price.get("currency"), Some(&Value::String("EUR".to_owned())));
        let amount = price.get("current_price").and_then(Value::as_f64).expect("amount");
        assert!((amount - 19.90).abs() < f64::EPSILON);
    }

    #[test]
    fn images_come_from_the_images_xpath() {
        let raw = extract_fields(PAGE, &XPathConfig::default_expressions());
        let images = raw.get("images").and_then(Value::as_array).expect("images");
        assert_eq!(images[0].get("url"), Some(&Value::String("/img/front.jpg".to_owned())));
        assert_eq!(images[0].get("alt_text"), Some(&Value::String("front".to_owned())));
    }

    #[test]
    fn attribute_rows_are_paired() {
        let raw = extract_fields(PAGE, &XPathConfig::default_expressions());
        let attributes = raw.get("attributes").and_then(Value::as_array).expect("attributes");
        assert_eq!(attributes[0].get("name"), Some(&Value::String("Color".to_owned())));
        assert_eq!(attributes[0].get("value"), Some(&Value::String("Black".to_owned())));
    }

    #[test]
    fn attribute_extraction_expressions_work() {
        let mut config = XPathConfig::default();
        config
            .fields
            .insert("images".to_owned(), FieldXPath::new("//img/@src").array());
        let raw = extract_fields(PAGE, &config);
        let images = raw.get("images").and_then(Value::as_array).expect("images");
        assert_eq!(images, &vec![Value::String("/img/front.jpg".to_owned())]);
    }

    #[test]
    fn unsupported_expressions_are_skipped() {
        let mut config = XPathConfig::default();
        config
            .fields
            .insert("title".to_owned(), FieldXPath::new("//h1[position()=1]"));
        config
            .fields
            .insert("brand".to_owned(), FieldXPath::new("//span[@class='brand']"));
        let raw = extract_fields(PAGE, &config);
        assert!(!raw.contains_key("title"));
        assert_eq!(raw.get("brand"), Some(&Value::String("Acme".to_owned())));
    }

    #[test]
    fn empty_page_yields_an_empty_map() {
        let raw = extract_fields("<html></html>", &XPathConfig::default_expressions());
        assert!(raw.is_empty());
    }
}
