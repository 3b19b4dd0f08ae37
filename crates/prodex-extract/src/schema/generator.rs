//! Schema generation from HTML.
//!
//! The heuristic analyzer walks the page looking for field candidates three
//! ways — known selectors with preset base scores, keyword matches, and
//! field-shaped regex matches — scores each candidate element, synthesizes
//! a stable selector for the best one, and keeps up to two alternatives.
//! When an LLM is configured its proposed schema is validated, corrected,
//! and blended with the heuristic output through the merger. Generated
//! schemas are cached per `domain + html-hash` and re-validated on read.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use sha2::{Digest, Sha256};

use prodex_core::{ExtractionSchema, FieldSpec, LlmClient, LlmParams};

use crate::error::SchemaError;
use crate::prompts::SCHEMA_GENERATION_PROMPT;
use crate::schema::merger::SchemaMerger;
use crate::schema::validator::{SchemaValidator, COMMON_FIELDS, REQUIRED_FIELDS};

/// E-commerce vertical inferred from the URL, used to pick extra fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainKind {
    MajorRetailer,
    Electronics,
    Fashion,
    Grocery,
    Furniture,
    General,
}

impl DomainKind {
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        static DOMAIN: OnceLock<Regex> = OnceLock::new();
        let pattern = DOMAIN
            .get_or_init(|| Regex::new(r"https?://(?:www\.)?([^/]+)").expect("valid pattern"));
        let Some(domain) = pattern
            .captures(&url.to_lowercase())
            .and_then(|c| c.get(1).map(|m| m.as_str().to_owned()))
        else {
            return Self::General;
        };

        let contains_any = |needles: &[&str]| needles.iter().any(|n| domain.contains(n));
        if contains_any(&["amazon", "ebay", "walmart", "target", "bestbuy"]) {
            Self::MajorRetailer
        } else if contains_any(&["electronics", "tech", "gadget"]) {
            Self::Electronics
        } else if contains_any(&["apparel", "clothing", "fashion", "wear"]) {
            Self::Fashion
        } else if contains_any(&["food", "grocery", "fresh"]) {
            Self::Grocery
        } else if contains_any(&["furniture", "home", "decor"]) {
            Self::Furniture
        } else {
            Self::General
        }
    }

    /// Extra fields worth looking for in this vertical.
    fn extra_fields(self) -> &'static [&'static str] {
        match self {
            Self::Electronics => &["specifications"],
            Self::Fashion => &["sizes", "colors"],
            _ => &[],
        }
    }
}

/// Detection patterns for one field.
struct FieldPatterns {
    /// `(selector, attribute, base_score)` triples.
    selectors: &'static [(&'static str, &'static str, f64)],
    keywords: &'static [&'static str],
    regex: Option<&'static str>,
    common_classes: &'static [&'static str],
}

const EMPTY_PATTERNS: FieldPatterns = FieldPatterns {
    selectors: &[],
    keywords: &[],
    regex: None,
    common_classes: &[],
};

#[allow(clippy::too_many_lines)]
fn field_patterns(field: &str) -> FieldPatterns {
    match field {
        "title" => FieldPatterns {
            selectors: &[
                ("h1", "text", 0.8),
                (".product-title", "text", 0.7),
                (".product-name", "text", 0.7),
                ("[itemprop='name']", "text", 0.9),
                ("[data-testid='product-title']", "text", 0.9),
                ("title", "text", 0.5),
            ],
            keywords: &["title", "name", "product"],
            regex: None,
            common_classes: &["title", "product-title", "product-name", "name"],
        },
        "price" => FieldPatterns {
            selectors: &[
                (".price", "text", 0.7),
                (".product-price", "text", 0.7),
                ("[itemprop='price']", "content", 0.9),
                ("[data-testid='price']", "text", 0.9),
                ("[data-price]", "data-price", 0.8),
            ],
            keywords: &["price", "cost"],
            regex: Some(r"(\$|€|£|\d+[,.]\d{2})"),
            common_classes: &["price", "product-price", "current-price", "sale-price"],
        },
        "description" => FieldPatterns {
            selectors: &[
                (".description", "text", 0.7),
                (".product-description", "text", 0.7),
                ("[itemprop='description']", "text", 0.9),
                ("#description", "text", 0.7),
                ("#product-description", "text", 0.7),
            ],
            keywords: &["description", "about", "details", "overview"],
            regex: None,
            common_classes: &["description", "product-description", "details", "overview"],
        },
        "brand" => FieldPatterns {
            selectors: &[
                (".brand", "text", 0.7),
                ("[itemprop='brand']", "text", 0.9),
                ("[data-testid='brand']", "text", 0.9),
            ],
            keywords: &["brand", "manufacturer"],
            regex: None,
            common_classes: &["brand", "manufacturer", "vendor"],
        },
        "images" => FieldPatterns {
            selectors: &[
                (".product-image img", "src", 0.7),
                (".gallery img", "src", 0.6),
                ("[itemprop='image']", "src", 0.9),
                (".product-gallery img", "src", 0.7),
                (".carousel img", "src", 0.6),
            ],
            keywords: &["image", "photo", "picture", "gallery"],
            regex: Some(r"(\.jpg|\.jpeg|\.png|\.gif|\.webp)"),
            common_classes: &["product-image", "gallery", "carousel", "product-gallery"],
        },
        "sku" => FieldPatterns {
            selectors: &[
                ("[itemprop='sku']", "text", 0.9),
                ("[data-testid='sku']", "text", 0.9),
                (".sku", "text", 0.7),
                (".product-sku", "text", 0.7),
            ],
            keywords: &["sku", "item number", "model"],
            regex: Some(r"(SKU|Model|Item)[\s:#]*([A-Z0-9\-]+)"),
            common_classes: &["sku", "product-sku", "item-number", "model-number"],
        },
        "availability" => FieldPatterns {
            selectors: &[
                ("[itemprop='availability']", "content", 0.9),
                (".availability", "text", 0.7),
                (".stock", "text", 0.7),
                ("[data-testid='availability']", "text", 0.9),
            ],
            keywords: &["in stock", "out of stock", "availability"],
            regex: Some(r"(in stock|out of stock|available|unavailable)"),
            common_classes: &["availability", "stock", "in-stock", "out-of-stock"],
        },
        "specifications" => FieldPatterns {
            selectors: &[
                (".specifications", "text", 0.7),
                (".specs", "text", 0.7),
                (".tech-specs", "text", 0.7),
                ("table.specs", "text", 0.6),
            ],
            keywords: &["specs", "specifications", "technical details"],
            regex: None,
            common_classes: &["specifications", "specs", "tech-specs"],
        },
        "sizes" => FieldPatterns {
            selectors: &[
                (".sizes", "text", 0.7),
                (".size-options", "text", 0.7),
                ("[data-testid='size-options']", "text", 0.9),
            ],
            keywords: &["size", "sizes", "available sizes"],
            regex: None,
            common_classes: &["sizes", "size-options", "size-selector"],
        },
        "colors" => FieldPatterns {
            selectors: &[
                (".colors", "text", 0.7),
                (".color-options", "text", 0.7),
                ("[data-testid='color-options']", "text", 0.9),
            ],
            keywords: &["color", "colors", "available colors"],
            regex: None,
            common_classes: &["colors", "color-options", "color-selector"],
        },
        _ => EMPTY_PATTERNS,
    }
}

fn field_variants(field: &str) -> &'static [&'static str] {
    match field {
        "title" => &["name", "product-name", "product-title", "product_name", "product_title"],
        "price" => &["product-price", "current-price", "sale-price", "product_price", "current_price"],
        "description" => &["product-description", "product_description", "details", "overview"],
        "brand" => &["manufacturer", "vendor", "make"],
        "images" => &["gallery", "product-images", "product_images", "photo"],
        "sku" => &["item-number", "product-number", "model-number", "item_number"],
        "availability" => &["stock", "in-stock", "inventory"],
        _ => &[],
    }
}

/// A scored candidate element for one field.
#[derive(Debug, Clone)]
struct Candidate {
    selector: String,
    score: f64,
    attribute: String,
}

pub struct SchemaGenerator {
    validator: SchemaValidator,
    merger: SchemaMerger,
    cache_dir: Option<PathBuf>,
    llm: Option<Arc<dyn LlmClient>>,
    llm_params: LlmParams,
}

impl Default for SchemaGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            validator: SchemaValidator::new(),
            merger: SchemaMerger::new(),
            cache_dir: None,
            llm: None,
            llm_params: LlmParams::default(),
        }
    }

    /// Enables on-disk schema caching under `dir`.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Enables the LLM-assisted generation path.
    #[must_use]
    pub fn with_llm(mut self, client: Arc<dyn LlmClient>, params: LlmParams) -> Self {
        self.llm = Some(client);
        self.llm_params = params;
        self
    }

    /// Cache key: page domain plus the first ten hex chars of the HTML hash.
    #[must_use]
    pub fn cache_key(url: &str, html: &str) -> String {
        let domain = url
            .split('/')
            .nth(2)
            .unwrap_or("unknown")
            .replace([':', '@'], "_");
        let digest = Sha256::digest(html.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("{domain}_{}", &hex[..10])
    }

    /// Generates a validated schema for `html`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Cache`] only for unexpected I/O failures while
    /// writing the cache; generation itself always produces a schema.
    pub async fn generate(
        &self,
        html: &str,
        url: Option<&str>,
    ) -> Result<ExtractionSchema, SchemaError> {
        let cache_key = url.map(|u| Self::cache_key(u, html));

        if let Some(key) = &cache_key {
            if let Some(cached) = self.read_cached(key).await {
                return Ok(cached);
            }
        }

        let mut schema = self.analyze(html, url);

        if let Some(llm) = &self.llm {
            match self.llm_schema(llm.as_ref(), html).await {
                Ok(llm_schema) => {
                    schema = self.merger.merge(&[schema, llm_schema]);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "LLM schema generation failed, using heuristics only");
                }
            }
        }

        if let Some(key) = &cache_key {
            self.write_cached(key, &schema).await?;
        }

        Ok(schema)
    }

    async fn llm_schema(
        &self,
        llm: &dyn LlmClient,
        html: &str,
    ) -> Result<ExtractionSchema, SchemaError> {
        let prompt = format!(
            "{SCHEMA_GENERATION_PROMPT}\n\nHTML:\n{html}\n\n\
             Return the schema as a JSON object with a \"fields\" list, where each field has \
             \"name\", \"selector\", \"attribute\", \"required\", and \"array\" keys."
        );
        let reply = llm
            .complete(&prompt, &self.llm_params)
            .await
            .map_err(|e| SchemaError::Validation {
                errors: vec![e.to_string()],
            })?;
        let value: Value = serde_json::from_str(strip_fences(&reply))?;
        Ok(self.validator.correct_value(&value).schema)
    }

    async fn read_cached(&self, key: &str) -> Option<ExtractionSchema> {
        let dir = self.cache_dir.as_ref()?;
        let path = dir.join(format!("{key}.json"));
        let raw = tokio::fs::read_to_string(&path).await.ok()?;
        let value: Value = serde_json::from_str(&raw).ok()?;

        // Cached schemas are re-validated; corrected copies are written back.
        let report = self.validator.validate_value(&value);
        let corrected = self.validator.correct_value(&value);
        if !report.is_valid() {
            tracing::info!(key, "corrected cached schema");
            if let Err(err) = self.write_cached(key, &corrected.schema).await {
                tracing::warn!(key, error = %err, "failed to rewrite corrected schema");
            }
        }
        Some(corrected.schema)
    }

    async fn write_cached(&self, key: &str, schema: &ExtractionSchema) -> Result<(), SchemaError> {
        let Some(dir) = &self.cache_dir else {
            return Ok(());
        };
        tokio::fs::create_dir_all(dir).await?;
        let body = serde_json::to_string_pretty(schema)?;
        tokio::fs::write(dir.join(format!("{key}.json")), body).await?;
        Ok(())
    }

    /// Pure heuristic analysis. Empty HTML yields the empty schema: required
    /// fields present with empty selectors, valid only after correction.
    #[must_use]
    pub fn analyze(&self, html: &str, url: Option<&str>) -> ExtractionSchema {
        if html.trim().is_empty() {
            return empty_schema();
        }

        let domain = url.map_or(DomainKind::General, DomainKind::from_url);
        let document = Html::parse_document(html);

        let mut field_names: Vec<&str> = COMMON_FIELDS.to_vec();
        field_names.extend_from_slice(domain.extra_fields());

        let mut fields = Vec::new();
        let mut used_selectors: Vec<String> = Vec::new();

        for field_name in field_names {
            let mut candidates = find_candidates(&document, field_name);
            candidates.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let Some(best) = candidates
                .iter()
                .find(|c| !used_selectors.contains(&c.selector))
            else {
                continue;
            };
            used_selectors.push(best.selector.clone());

            let mut field = FieldSpec::new(field_name, best.selector.clone());
            field.attribute = best.attribute.clone();
            field.required = REQUIRED_FIELDS.contains(&field_name);
            if field_name == "images" {
                field.array = true;
            }
            for candidate in &candidates {
                if field.alternative_selectors.len() == 2 {
                    break;
                }
                if candidate.selector != field.selector
                    && candidate.score >= 0.3
                    && !field.alternative_selectors.contains(&candidate.selector)
                {
                    field.alternative_selectors.push(candidate.selector.clone());
                }
            }
            fields.push(field);
        }

        for required in REQUIRED_FIELDS {
            if !fields.iter().any(|f| f.name == *required) {
                let mut field = FieldSpec::new(*required, "");
                field.required = true;
                fields.push(field);
            }
        }

        let schema = ExtractionSchema::new("Generated Schema", fields);
        self.validator.correct(&schema).schema
    }
}

fn empty_schema() -> ExtractionSchema {
    let fields = REQUIRED_FIELDS
        .iter()
        .map(|name| {
            let mut field = FieldSpec::new(*name, "");
            field.required = true;
            field
        })
        .collect();
    ExtractionSchema::new("Empty Schema", fields)
}

fn strip_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

// ---------------------------------------------------------------------------
// Candidate search
// ---------------------------------------------------------------------------

fn find_candidates(document: &Html, field_name: &str) -> Vec<Candidate> {
    let patterns = field_patterns(field_name);
    let mut candidates = Vec::new();

    for (selector, attribute, base_score) in patterns.selectors {
        let Ok(parsed) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&parsed) {
            let content = element_content(element, attribute);
            if content.is_empty() {
                continue;
            }
            candidates.push(Candidate {
                selector: selector_path(element),
                score: score_element(element, field_name, attribute, &content, *base_score),
                attribute: (*attribute).to_owned(),
            });
        }
    }

    // Keyword and regex search over text-bearing elements.
    let all = Selector::parse("body *").expect("valid selector");
    let regex = patterns.regex.and_then(|p| Regex::new(p).ok());
    for element in document.select(&all) {
        let name = element.value().name();
        if name == "script" || name == "style" {
            continue;
        }
        let text = own_text(element);
        if text.is_empty() {
            continue;
        }
        let lowered = text.to_lowercase();

        if patterns
            .keywords
            .iter()
            .any(|keyword| lowered.contains(keyword))
        {
            candidates.push(Candidate {
                selector: selector_path(element),
                score: score_element(element, field_name, "text", &text, 0.3),
                attribute: "text".to_owned(),
            });
        }
        if let Some(regex) = &regex {
            if regex.is_match(&text) {
                candidates.push(Candidate {
                    selector: selector_path(element),
                    score: score_element(element, field_name, "text", &text, 0.4),
                    attribute: "text".to_owned(),
                });
            }
        }

        let classes = class_string(element);
        if patterns
            .common_classes
            .iter()
            .any(|class| classes.contains(class))
        {
            candidates.push(Candidate {
                selector: selector_path(element),
                score: score_element(element, field_name, "text", &text, 0.5),
                attribute: "text".to_owned(),
            });
        }
    }

    if field_name == "images" {
        candidates.extend(image_candidates(document));
    }

    candidates
}

/// Image-specific search: real product imagery only — no gifs, svgs, icons,
/// or thumbnails under 100px.
fn image_candidates(document: &Html) -> Vec<Candidate> {
    let img_selector = Selector::parse("img").expect("valid selector");
    let mut candidates = Vec::new();
    for img in document.select(&img_selector) {
        let Some(src) = img.value().attr("src") else {
            continue;
        };
        let lowered = src.to_lowercase();
        if src.is_empty()
            || lowered.ends_with(".gif")
            || lowered.ends_with(".svg")
            || lowered.contains("icon")
        {
            continue;
        }
        let too_small = |attr: &str| {
            img.value()
                .attr(attr)
                .and_then(|v| v.parse::<u32>().ok())
                .is_some_and(|size| size < 100)
        };
        if too_small("width") || too_small("height") {
            continue;
        }

        let classes = class_string(img);
        let mut score = 0.4;
        if classes.contains("product") {
            score += 0.3;
        }
        if classes.contains("main") {
            score += 0.2;
        }
        candidates.push(Candidate {
            selector: selector_path(img),
            score,
            attribute: "src".to_owned(),
        });
    }
    candidates
}

fn score_element(
    element: ElementRef<'_>,
    field_name: &str,
    attribute: &str,
    content: &str,
    base_score: f64,
) -> f64 {
    let mut score = base_score;
    let tag = element.value().name();

    if tag == "h1" {
        score += 0.2;
    } else if tag == "h2" || tag == "h3" {
        score += 0.1;
    }

    let hidden = element.value().attr("hidden").is_some()
        || element
            .value()
            .attr("style")
            .is_some_and(|s| s.replace(' ', "").contains("display:none"));
    if hidden {
        score -= 0.5;
    }

    let id = element.value().attr("id").unwrap_or("").to_lowercase();
    let classes = class_string(element);
    let variants = field_variants(field_name);

    if id.contains(&field_name.to_lowercase()) {
        score += 0.2;
    }
    if variants.iter().any(|v| id.contains(v)) {
        score += 0.1;
    }
    if classes.contains(&field_name.to_lowercase()) {
        score += 0.15;
    }
    if variants.iter().any(|v| classes.contains(v)) {
        score += 0.1;
    }

    static PRICE_SHAPE: OnceLock<Regex> = OnceLock::new();
    static IMAGE_SHAPE: OnceLock<Regex> = OnceLock::new();
    match field_name {
        "price" => {
            let shape = PRICE_SHAPE
                .get_or_init(|| Regex::new(r"(\$|€|£|\d+[,.]\d{2})").expect("valid pattern"));
            if shape.is_match(content) {
                score += 0.2;
            }
        }
        "title" if tag == "h1" => score += 0.3,
        "description" if content.len() > 100 => score += 0.1,
        "images" if attribute == "src" => {
            let shape = IMAGE_SHAPE
                .get_or_init(|| Regex::new(r"\.(jpg|jpeg|png|webp)").expect("valid pattern"));
            if shape.is_match(content) {
                score += 0.2;
            }
        }
        _ => {}
    }

    score.clamp(0.0, 1.0)
}

/// Synthesizes a stable CSS selector for an element: id, then a
/// distinguishing class, then an `img[src$=...]` match, then a
/// parent-anchored positional selector, and finally the bare tag name.
fn selector_path(element: ElementRef<'_>) -> String {
    if let Some(id) = element.value().attr("id") {
        if !id.is_empty() {
            return format!("#{id}");
        }
    }

    let tag = element.value().name();
    for class in element.value().classes() {
        let lowered = class.to_lowercase();
        if matches!(lowered.as_str(), "row" | "col" | "container" | "wrapper" | "section") {
            continue;
        }
        return format!("{tag}.{class}");
    }

    if tag == "img" {
        if let Some(src) = element.value().attr("src") {
            if let Some(filename) = src.split('/').next_back() {
                let filename = filename.split('?').next().unwrap_or(filename);
                if !filename.is_empty() {
                    return format!("img[src$='{filename}']");
                }
            }
        }
    }

    // Walk up looking for an id-bearing ancestor to anchor a positional
    // selector on.
    let mut depth = 0;
    let mut current = element.parent();
    while let Some(node) = current {
        if depth >= 3 {
            break;
        }
        let Some(parent) = ElementRef::wrap(node) else {
            break;
        };
        if parent.value().name() == "body" {
            break;
        }
        if let Some(parent_id) = parent.value().attr("id") {
            let position = parent
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|sibling| sibling.value().name() == tag)
                .position(|sibling| sibling.id() == element.id());
            if let Some(position) = position {
                return format!("#{parent_id} > {tag}:nth-of-type({})", position + 1);
            }
        }
        current = node.parent();
        depth += 1;
    }

    tag.to_owned()
}

fn element_content(element: ElementRef<'_>, attribute: &str) -> String {
    if attribute == "text" {
        full_text(element)
    } else {
        element
            .value()
            .attr(attribute)
            .unwrap_or("")
            .trim()
            .to_owned()
    }
}

fn full_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

/// Text directly inside the element (not nested children) — keyword search
/// uses this so container divs don't match on behalf of their children.
fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect::<String>()
        .trim()
        .to_owned()
}

fn class_string(element: ElementRef<'_>) -> String {
    element
        .value()
        .classes()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
#[path = "generator_test.rs"]
mod tests;
