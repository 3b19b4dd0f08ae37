//! Feedback-driven schema enhancement.
//!
//! Given which fields extracted successfully and which failed, widens the
//! failing fields' selectors with alternatives from the built-in catalogue,
//! attaches post-processing hints, and appends domain-specific fields. The
//! enhanced schema is validated before it is returned.

use prodex_core::{ExtractionSchema, FieldSpec};

use crate::schema::validator::SchemaValidator;

/// Outcome of a previous extraction run against a schema.
#[derive(Debug, Clone, Default)]
pub struct ExtractionFeedback {
    pub successful_fields: Vec<String>,
    pub failed_fields: Vec<String>,
}

/// Catalogue of fallback selectors for commonly failing fields.
fn alternative_selectors(field_name: &str) -> &'static [&'static str] {
    match field_name {
        "title" | "name" | "product_name" => &[
            "h1",
            ".product-title",
            ".product-name",
            "[itemprop='name']",
            "[data-testid='product-title']",
        ],
        "price" | "current_price" | "sale_price" => &[
            ".price",
            ".product-price",
            "[itemprop='price']",
            "[data-testid='price']",
            ".current-price",
            ".sale-price",
        ],
        "description" | "product_description" => &[
            ".description",
            ".product-description",
            "[itemprop='description']",
            "#description",
            "#product-description",
        ],
        "brand" | "manufacturer" => &[
            ".brand",
            ".manufacturer",
            "[itemprop='brand']",
            "[data-testid='brand']",
        ],
        "image" | "images" | "gallery" => &[
            ".product-image img",
            ".gallery img",
            "[itemprop='image']",
            ".product-gallery img",
        ],
        _ => &[],
    }
}

/// Domain-specific fields appended when absent: `(name, selector, array)`.
fn domain_fields(domain: &str) -> &'static [(&'static str, &'static str, bool)] {
    match domain {
        "electronics" => &[
            (
                "specifications",
                ".specifications, .specs, .tech-specs, #specifications, table.specs",
                true,
            ),
            (
                "model_number",
                ".model-number, [itemprop='model'], [data-testid='model-number']",
                false,
            ),
            ("warranty", ".warranty, .warranty-info, [data-testid='warranty']", false),
        ],
        "fashion" => &[
            (
                "sizes",
                ".sizes, .size-options, [data-testid='size-options'], .size-selector",
                true,
            ),
            (
                "colors",
                ".colors, .color-options, [data-testid='color-options'], .color-selector",
                true,
            ),
            ("material", ".material, [itemprop='material'], [data-testid='material']", false),
        ],
        "grocery" => &[
            ("ingredients", ".ingredients, [itemprop='ingredients'], .ingredient-list", false),
            ("nutrition_facts", ".nutrition-facts, .nutrition, .nutrition-info", false),
            ("weight", ".weight, .product-weight, [itemprop='weight']", false),
        ],
        "furniture" => &[
            (
                "dimensions",
                ".dimensions, .product-dimensions, [itemprop='height'], [itemprop='width']",
                false,
            ),
            ("assembly_required", ".assembly, .assembly-required, [data-testid='assembly']", false),
            ("material", ".material, [itemprop='material'], [data-testid='material']", false),
        ],
        _ => &[],
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaEnhancer {
    validator: SchemaValidator,
}

impl SchemaEnhancer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies feedback- and domain-driven improvements to `schema`.
    #[must_use]
    pub fn enhance(
        &self,
        schema: &ExtractionSchema,
        feedback: &ExtractionFeedback,
        domain: Option<&str>,
    ) -> ExtractionSchema {
        let mut enhanced = schema.clone();

        for field in &mut enhanced.fields {
            if !feedback.failed_fields.contains(&field.name) {
                continue;
            }
            improve_failing_field(field);
        }

        if let Some(domain) = domain {
            let existing: Vec<String> = enhanced
                .fields
                .iter()
                .map(|f| f.name.to_lowercase())
                .collect();
            for (name, selector, array) in domain_fields(&domain.to_lowercase()) {
                if existing.iter().any(|n| n == name) {
                    continue;
                }
                let mut field = FieldSpec::new(*name, *selector);
                field.array = *array;
                field.description = Some(format!("Domain-specific field for {domain}"));
                tracing::info!(field = name, domain, "added domain-specific field");
                enhanced.fields.push(field);
            }
        }

        self.validator.correct(&enhanced).schema
    }
}

fn improve_failing_field(field: &mut FieldSpec) {
    let name = field.name.to_lowercase();
    let alternatives = alternative_selectors(&name);

    if !alternatives.is_empty() {
        // Widen the primary selector with every catalogue alternative not
        // already covered.
        let mut parts: Vec<String> = field
            .selector
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
        for alternative in alternatives {
            if !parts.iter().any(|p| p == alternative) {
                parts.push((*alternative).to_owned());
            }
        }
        let original = field.selector.clone();
        field.selector = parts.join(", ");
        for alternative in alternatives {
            if !field.alternative_selectors.iter().any(|a| a == alternative) {
                field.alternative_selectors.push((*alternative).to_owned());
            }
        }
        tracing::info!(
            field = %field.name,
            from = %original,
            to = %field.selector,
            "widened selector for failing field"
        );
    }

    match name.as_str() {
        "price" | "current_price" | "sale_price" => {
            if field.attribute == "text" {
                field.post_process = Some("extract_price".to_owned());
            }
        }
        "images" | "gallery" => {
            if field.attribute == "text" {
                field.attribute = "src".to_owned();
            }
            field.array = true;
        }
        _ => {}
    }
}
