//! Schema validation and deterministic correction.
//!
//! Accepts loosely-shaped schema JSON — either `{"fields": [...]}` or a
//! direct `{field_name: selector-or-config}` mapping — normalizes to the
//! first shape, reports validation errors, and repairs what it can. Repairs
//! are recorded as data ([`Correction`]) rather than applied silently.

use scraper::Selector;
use serde_json::{Map, Value};

use prodex_core::{ExtractionSchema, FieldSpec, PriceParsing};

use crate::error::SchemaError;

/// Fields every schema must carry.
pub const REQUIRED_FIELDS: &[&str] = &["title", "price"];

/// The common product fields used for coverage scoring and default
/// selectors.
pub const COMMON_FIELDS: &[&str] = &[
    "title",
    "price",
    "description",
    "brand",
    "images",
    "sku",
    "availability",
];

/// Keys of a schema object that are not field definitions.
const SPECIAL_KEYS: &[&str] = &["name", "description"];

/// Built-in default [`FieldSpec`] for a common field name.
#[must_use]
pub fn default_field(name: &str) -> Option<FieldSpec> {
    let mut field = match name {
        "title" => FieldSpec::new("title", ".product-title, h1, .product-name"),
        "price" => FieldSpec::new("price", ".product-price, .price, span[itemprop='price']"),
        "description" => FieldSpec::new(
            "description",
            ".product-description, [itemprop='description'], .description",
        ),
        "brand" => FieldSpec::new("brand", ".product-brand, [itemprop='brand'], .brand"),
        "images" => FieldSpec::new("images", ".product-image, img.product, [itemprop='image']"),
        "sku" => FieldSpec::new("sku", "[itemprop='sku'], .product-sku, .sku"),
        "availability" => {
            FieldSpec::new("availability", "[itemprop='availability'], .availability-status")
        }
        _ => return None,
    };
    match name {
        "title" => field.required = true,
        "price" => {
            field.required = true;
            field.price_parsing = Some(PriceParsing::default());
        }
        "images" => {
            field.attribute = "src".to_owned();
            field.array = true;
        }
        _ => {}
    }
    Some(field)
}

/// Outcome of validating a schema.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// One applied repair: which field it touched and what was done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub field: String,
    pub action: String,
}

impl Correction {
    fn new(field: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            action: action.into(),
        }
    }
}

/// A corrected schema together with the list of repairs that produced it.
#[derive(Debug, Clone)]
pub struct CorrectedSchema {
    pub schema: ExtractionSchema,
    pub corrections: Vec<Correction>,
}

/// Quality report combining validity, score, and coverage.
#[derive(Debug, Clone)]
pub struct SchemaReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub quality_score: f64,
    pub total_fields: usize,
    pub required_fields: usize,
    pub corrections: Vec<Correction>,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    strict: bool,
}

impl SchemaValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict mode turns validation failures into [`SchemaError::Validation`].
    #[must_use]
    pub fn strict() -> Self {
        Self { strict: true }
    }

    #[must_use]
    pub fn is_valid_selector(selector: &str) -> bool {
        !selector.is_empty() && Selector::parse(selector).is_ok()
    }

    // -- validation ----------------------------------------------------------

    /// Validates a loosely-shaped schema value.
    #[must_use]
    pub fn validate_value(&self, value: &Value) -> ValidationReport {
        let mut report = ValidationReport::default();

        let Value::Object(map) = value else {
            report.errors.push("schema must be a JSON object".to_owned());
            return report;
        };

        if map.get("fields").is_some_and(Value::is_array) {
            self.validate_fields_list(map, &mut report);
        } else {
            self.validate_direct_fields(map, &mut report);
        }
        report
    }

    /// Validates a typed schema.
    #[must_use]
    pub fn validate(&self, schema: &ExtractionSchema) -> ValidationReport {
        let value = match serde_json::to_value(schema) {
            Ok(value) => value,
            Err(e) => {
                return ValidationReport {
                    errors: vec![format!("schema failed to serialize: {e}")],
                    warnings: Vec::new(),
                }
            }
        };
        self.validate_value(&value)
    }

    /// Validates and raises in strict mode.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Validation`] carrying the error list when the
    /// schema is invalid.
    pub fn validate_strict(&self, schema: &ExtractionSchema) -> Result<(), SchemaError> {
        let report = self.validate(schema);
        if report.is_valid() {
            Ok(())
        } else {
            Err(SchemaError::Validation {
                errors: report.errors,
            })
        }
    }

    fn validate_fields_list(&self, map: &Map<String, Value>, report: &mut ValidationReport) {
        let Some(Value::Array(fields)) = map.get("fields") else {
            report.errors.push("schema must contain a fields list".to_owned());
            return;
        };
        if fields.is_empty() {
            report
                .errors
                .push("schema must contain at least one field".to_owned());
            return;
        }

        let mut seen = Vec::new();
        let mut duplicates = Vec::new();
        for (index, field) in fields.iter().enumerate() {
            let Value::Object(field_map) = field else {
                report
                    .errors
                    .push(format!("field at index {index} must be an object"));
                continue;
            };
            let Some(Value::String(name)) = field_map.get("name") else {
                report
                    .errors
                    .push(format!("field at index {index} is missing a string name"));
                continue;
            };
            if seen.contains(name) {
                if !duplicates.contains(name) {
                    duplicates.push(name.clone());
                }
            } else {
                seen.push(name.clone());
            }
            self.validate_field_map(name, field_map, report);
        }

        for name in duplicates {
            report.errors.push(format!("duplicate field name: {name}"));
        }

        for required in REQUIRED_FIELDS {
            if !seen.iter().any(|n| n == required) {
                report.errors.push(format!("required field missing: {required}"));
            }
        }
    }

    fn validate_direct_fields(&self, map: &Map<String, Value>, report: &mut ValidationReport) {
        let field_names: Vec<&String> = map
            .keys()
            .filter(|k| !SPECIAL_KEYS.contains(&k.as_str()))
            .collect();

        if field_names.is_empty() {
            report
                .errors
                .push("schema must contain at least one field".to_owned());
            return;
        }

        for required in REQUIRED_FIELDS {
            if !field_names.iter().any(|n| n.as_str() == *required) {
                report.errors.push(format!("required field missing: {required}"));
            }
        }

        for name in field_names {
            match map.get(name) {
                // A bare selector string is fine; attribute "text" is
                // injected during correction.
                Some(Value::String(selector)) => {
                    if !Self::is_valid_selector(selector) {
                        report
                            .errors
                            .push(format!("field '{name}' has an invalid CSS selector"));
                    }
                }
                Some(Value::Object(field_map)) => self.validate_field_map(name, field_map, report),
                _ => report
                    .errors
                    .push(format!("field '{name}' must be a selector string or object")),
            }
        }
    }

    #[allow(clippy::unused_self)]
    fn validate_field_map(
        &self,
        name: &str,
        field: &Map<String, Value>,
        report: &mut ValidationReport,
    ) {
        if name.is_empty() {
            report.errors.push("field name must not be empty".to_owned());
            return;
        }

        match field.get("selector") {
            Some(Value::String(selector)) => {
                if !Self::is_valid_selector(selector) {
                    report.errors.push(format!(
                        "field '{name}' has an invalid CSS selector: {selector}"
                    ));
                }
            }
            Some(_) => report
                .errors
                .push(format!("field '{name}' selector must be a string")),
            None => report
                .errors
                .push(format!("field '{name}' is missing a selector")),
        }

        if field.get("attribute").is_some_and(|v| !v.is_string()) {
            report
                .errors
                .push(format!("field '{name}' attribute must be a string"));
        }
        for flag in ["array", "required"] {
            if field.get(flag).is_some_and(|v| !v.is_boolean()) {
                report
                    .errors
                    .push(format!("field '{name}' {flag} must be a boolean"));
            }
        }

        if let Some(price_parsing) = field.get("price_parsing") {
            let Value::Object(pp) = price_parsing else {
                report
                    .errors
                    .push(format!("field '{name}' price_parsing must be an object"));
                return;
            };
            if pp.get("currency_symbols").is_some_and(|v| !v.is_array()) {
                report.errors.push(format!(
                    "field '{name}' price_parsing.currency_symbols must be a list"
                ));
            }
            for key in ["decimal_separator", "thousands_separator"] {
                if pp.get(key).is_some_and(|v| !v.is_string()) {
                    report
                        .errors
                        .push(format!("field '{name}' price_parsing.{key} must be a string"));
                }
            }
            if pp.get("strip_non_numeric").is_some_and(|v| !v.is_boolean()) {
                report.errors.push(format!(
                    "field '{name}' price_parsing.strip_non_numeric must be a boolean"
                ));
            }
        }
    }

    // -- correction ----------------------------------------------------------

    /// Corrects a typed schema.
    #[must_use]
    pub fn correct(&self, schema: &ExtractionSchema) -> CorrectedSchema {
        match serde_json::to_value(schema) {
            Ok(value) => self.correct_value(&value),
            Err(_) => self.correct_value(&Value::Null),
        }
    }

    /// Applies deterministic repairs to a loosely-shaped schema value and
    /// returns a well-typed schema plus the corrections that were needed.
    #[must_use]
    pub fn correct_value(&self, value: &Value) -> CorrectedSchema {
        let empty = Map::new();
        let map = value.as_object().unwrap_or(&empty);

        let name = map
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Product Extraction Schema")
            .to_owned();

        let mut corrections = Vec::new();
        let mut fields: Vec<FieldSpec> = Vec::new();
        let mut seen: Vec<String> = Vec::new();

        if let Some(Value::Array(raw_fields)) = map.get("fields") {
            for raw in raw_fields {
                let Value::Object(field_map) = raw else {
                    continue;
                };
                let Some(field_name) = field_map.get("name").and_then(Value::as_str) else {
                    continue;
                };
                if seen.iter().any(|n| n == field_name) {
                    corrections.push(Correction::new(field_name, "dropped duplicate definition"));
                    continue;
                }
                seen.push(field_name.to_owned());
                fields.push(self.correct_field(field_name, field_map, &mut corrections));
            }
        } else {
            for (field_name, raw) in map {
                if SPECIAL_KEYS.contains(&field_name.as_str()) {
                    continue;
                }
                if seen.iter().any(|n| n == field_name) {
                    continue;
                }
                seen.push(field_name.clone());
                match raw {
                    Value::String(selector) => {
                        let mut field_map = Map::new();
                        field_map
                            .insert("selector".to_owned(), Value::String(selector.clone()));
                        // Bare-string fields always gain an explicit
                        // text attribute.
                        corrections
                            .push(Correction::new(field_name, "injected attribute \"text\""));
                        fields.push(self.correct_field(field_name, &field_map, &mut corrections));
                    }
                    Value::Object(field_map) => {
                        fields.push(self.correct_field(field_name, field_map, &mut corrections));
                    }
                    _ => {
                        corrections
                            .push(Correction::new(field_name, "replaced unusable definition"));
                        fields.push(self.correct_field(field_name, &Map::new(), &mut corrections));
                    }
                }
            }
        }

        for required in REQUIRED_FIELDS {
            if !seen.iter().any(|n| n == required) {
                let field = default_field(required).unwrap_or_else(|| {
                    FieldSpec::new(*required, format!(".{required}"))
                });
                corrections.push(Correction::new(*required, "added missing required field"));
                fields.push(field);
            }
        }

        CorrectedSchema {
            schema: ExtractionSchema::new(name, fields),
            corrections,
        }
    }

    #[allow(clippy::unused_self)]
    fn correct_field(
        &self,
        name: &str,
        raw: &Map<String, Value>,
        corrections: &mut Vec<Correction>,
    ) -> FieldSpec {
        let mut field = FieldSpec::new(name, "");

        match raw.get("selector").and_then(Value::as_str) {
            Some(selector) if Self::is_valid_selector(selector) => {
                field.selector = selector.to_owned();
            }
            _ => {
                field.selector = default_field(name)
                    .map_or_else(|| format!(".{name}"), |d| d.selector);
                corrections.push(Correction::new(name, "replaced invalid selector"));
            }
        }

        match raw.get("attribute").and_then(Value::as_str) {
            Some(attribute) => field.attribute = attribute.to_owned(),
            None => {
                field.attribute = if name == "images" { "src" } else { "text" }.to_owned();
                if raw.contains_key("attribute") {
                    corrections.push(Correction::new(name, "replaced invalid attribute"));
                }
            }
        }

        field.required = match raw.get("required").and_then(Value::as_bool) {
            Some(required) => required,
            None => {
                let default = REQUIRED_FIELDS.contains(&name);
                if default {
                    corrections.push(Correction::new(name, "marked required"));
                }
                default
            }
        };

        field.array = match raw.get("array").and_then(Value::as_bool) {
            Some(array) => array,
            None => {
                let default = name == "images";
                if default {
                    corrections.push(Correction::new(name, "marked as array"));
                }
                default
            }
        };

        if name == "price" {
            field.price_parsing = Some(correct_price_parsing(raw.get("price_parsing")));
            if !raw.get("price_parsing").is_some_and(Value::is_object) {
                corrections.push(Correction::new(name, "injected default price parsing"));
            }
        } else if let Some(Value::Object(_)) = raw.get("price_parsing") {
            field.price_parsing = Some(correct_price_parsing(raw.get("price_parsing")));
        }

        if let Some(description) = raw.get("description").and_then(Value::as_str) {
            field.description = Some(description.to_owned());
        }
        if let Some(Value::Array(alternatives)) = raw.get("alternative_selectors") {
            field.alternative_selectors = alternatives
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| Self::is_valid_selector(s))
                .map(str::to_owned)
                .collect();
        }
        if let Some(post_process) = raw.get("post_process").and_then(Value::as_str) {
            field.post_process = Some(post_process.to_owned());
        }

        field
    }

    // -- quality -------------------------------------------------------------

    /// Quality score in `[0, 1]`: the average per-field score blended 70/30
    /// with coverage of the common product fields.
    #[must_use]
    pub fn quality_score(&self, schema: &ExtractionSchema) -> f64 {
        if schema.fields.is_empty() {
            return 0.0;
        }

        let mut field_scores = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            let mut score = 0.0;
            if !field.name.is_empty() && !field.selector.is_empty() {
                score += 0.5;
            }
            if REQUIRED_FIELDS.contains(&field.name.as_str()) && field.required {
                score += 0.1;
            }
            if field.selector.len() > 5 {
                score += 0.1;
            }
            if !field.attribute.is_empty() {
                score += 0.1;
            }
            if field.name == "price" && field.price_parsing.is_some() {
                score += 0.2;
            }
            field_scores.push(score);
        }

        #[allow(clippy::cast_precision_loss)]
        let average = field_scores.iter().sum::<f64>() / field_scores.len() as f64;

        let covered = COMMON_FIELDS
            .iter()
            .filter(|common| schema.fields.iter().any(|f| f.name == **common))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let coverage = covered as f64 / COMMON_FIELDS.len() as f64;

        (average * 0.7 + coverage * 0.3).clamp(0.0, 1.0)
    }

    /// Full quality report for a loosely-shaped schema value.
    #[must_use]
    pub fn generate_report(&self, value: &Value) -> SchemaReport {
        let validation = self.validate_value(value);
        let corrected = self.correct_value(value);
        SchemaReport {
            is_valid: validation.is_valid(),
            errors: validation.errors,
            quality_score: self.quality_score(&corrected.schema),
            total_fields: corrected.schema.fields.len(),
            required_fields: corrected
                .schema
                .fields
                .iter()
                .filter(|f| f.required)
                .count(),
            corrections: corrected.corrections,
        }
    }

    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

fn correct_price_parsing(raw: Option<&Value>) -> PriceParsing {
    let mut parsing = PriceParsing::default();
    let Some(Value::Object(map)) = raw else {
        return parsing;
    };
    if let Some(Value::Array(symbols)) = map.get("currency_symbols") {
        let symbols: Vec<String> = symbols
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect();
        if !symbols.is_empty() {
            parsing.currency_symbols = symbols;
        }
    }
    if let Some(sep) = map.get("decimal_separator").and_then(Value::as_str) {
        parsing.decimal_separator = sep.to_owned();
    }
    if let Some(sep) = map.get("thousands_separator").and_then(Value::as_str) {
        parsing.thousands_separator = sep.to_owned();
    }
    if let Some(strip) = map.get("strip_non_numeric").and_then(Value::as_bool) {
        parsing.strip_non_numeric = strip;
    }
    parsing
}

#[cfg(test)]
#[path = "validator_test.rs"]
mod tests;
