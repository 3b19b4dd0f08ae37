//! Schema merging.
//!
//! Combines N schemas into one: fields present in several inputs keep a
//! single record whose selector, attribute, flags, and description are the
//! best on offer. Input schemas are quality-scored first; schemas below the
//! threshold are ignored unless nothing clears it.

use prodex_core::{ExtractionSchema, FieldSpec};

use crate::schema::validator::SchemaValidator;

/// Attribute preference when two schemas disagree: structured-data
/// attributes beat extraction of visible text.
fn attribute_priority(attribute: &str) -> u32 {
    match attribute {
        "content" => 5,
        "itemprop" => 4,
        _ if attribute.starts_with("data-") => 4,
        "src" => 3,
        "href" => 2,
        "alt" => 1,
        _ => 0,
    }
}

/// CSS specificity approximation: ids count 100, classes and attribute
/// selectors 10, bare element tags 1.
#[must_use]
pub fn selector_specificity(selector: &str) -> u32 {
    let ids = u32::try_from(selector.matches('#').count()).unwrap_or(u32::MAX);
    let classes = u32::try_from(selector.matches('.').count()).unwrap_or(u32::MAX);
    let attributes = u32::try_from(selector.matches('[').count()).unwrap_or(u32::MAX);
    let elements = u32::try_from(
        selector
            .split(' ')
            .filter(|part| {
                !part.is_empty() && !part.starts_with('#') && !part.starts_with('.')
                    && !part.contains('[')
            })
            .count(),
    )
    .unwrap_or(u32::MAX);
    ids * 100 + classes * 10 + attributes * 10 + elements
}

fn is_better_selector(candidate: &str, existing: &str) -> bool {
    if candidate.starts_with('#') && !existing.starts_with('#') {
        return true;
    }
    let candidate_specificity = selector_specificity(candidate);
    let existing_specificity = selector_specificity(existing);
    if candidate_specificity > existing_specificity {
        return true;
    }
    candidate_specificity == existing_specificity && candidate.len() < existing.len()
}

pub struct SchemaMerger {
    quality_threshold: f64,
    validator: SchemaValidator,
}

impl Default for SchemaMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaMerger {
    #[must_use]
    pub fn new() -> Self {
        Self::with_quality_threshold(0.6)
    }

    #[must_use]
    pub fn with_quality_threshold(quality_threshold: f64) -> Self {
        Self {
            quality_threshold,
            validator: SchemaValidator::new(),
        }
    }

    /// Merges `schemas` into one schema containing the union of their
    /// fields; the result is always valid.
    #[must_use]
    pub fn merge(&self, schemas: &[ExtractionSchema]) -> ExtractionSchema {
        if schemas.is_empty() {
            return self
                .validator
                .correct(&ExtractionSchema::new("Merged Schema", Vec::new()))
                .schema;
        }
        if schemas.len() == 1 {
            return self.validator.correct(&schemas[0]).schema;
        }

        // Correct and score every input, best first.
        let mut scored: Vec<(ExtractionSchema, f64)> = schemas
            .iter()
            .map(|schema| {
                let corrected = self.validator.correct(schema).schema;
                let score = self.validator.quality_score(&corrected);
                (corrected, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let eligible: Vec<&ExtractionSchema> = {
            let passing: Vec<&ExtractionSchema> = scored
                .iter()
                .filter(|(_, score)| *score >= self.quality_threshold)
                .map(|(schema, _)| schema)
                .collect();
            if passing.is_empty() {
                // Nothing clears the bar: fall back to the best input alone.
                vec![&scored[0].0]
            } else {
                passing
            }
        };

        let mut fields: Vec<FieldSpec> = Vec::new();
        for schema in eligible {
            for field in &schema.fields {
                match fields.iter_mut().find(|f| f.name == field.name) {
                    None => fields.push(field.clone()),
                    Some(existing) => merge_field(existing, field),
                }
            }
        }

        let merged = ExtractionSchema::new("Merged Schema", fields);
        if self.validator.validate(&merged).is_valid() {
            merged
        } else {
            self.validator.correct(&merged).schema
        }
    }
}

fn merge_field(existing: &mut FieldSpec, incoming: &FieldSpec) {
    if is_better_selector(&incoming.selector, &existing.selector) {
        existing.selector = incoming.selector.clone();
    }
    if attribute_priority(&incoming.attribute) > attribute_priority(&existing.attribute) {
        existing.attribute = incoming.attribute.clone();
    }
    existing.required = existing.required || incoming.required;
    existing.array = existing.array || incoming.array;

    match (&existing.description, &incoming.description) {
        (Some(current), Some(candidate)) if candidate.len() > current.len() => {
            existing.description = incoming.description.clone();
        }
        (None, Some(_)) => existing.description = incoming.description.clone(),
        _ => {}
    }

    if existing.price_parsing.is_none() {
        existing.price_parsing = incoming.price_parsing.clone();
    }
    for alternative in &incoming.alternative_selectors {
        if !existing.alternative_selectors.contains(alternative) {
            existing.alternative_selectors.push(alternative.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodex_core::PriceParsing;

    fn schema(fields: Vec<FieldSpec>) -> ExtractionSchema {
        ExtractionSchema::new("test", fields)
    }

    fn field(name: &str, selector: &str) -> FieldSpec {
        FieldSpec::new(name, selector)
    }

    fn base_pair() -> Vec<FieldSpec> {
        vec![
            {
                let mut f = field("title", "h1.product-title");
                f.required = true;
                f
            },
            {
                let mut f = field("price", ".product-price");
                f.required = true;
                f.price_parsing = Some(PriceParsing::default());
                f
            },
        ]
    }

    #[test]
    fn merged_schema_contains_the_union_of_field_names() {
        let mut a_fields = base_pair();
        a_fields.push(field("brand", ".brand"));
        let mut b_fields = base_pair();
        b_fields.push(field("sku", ".sku"));

        let merged = SchemaMerger::new().merge(&[schema(a_fields), schema(b_fields)]);
        for name in ["title", "price", "brand", "sku"] {
            assert!(merged.field(name).is_some(), "missing {name}");
        }
        assert!(SchemaValidator::new().validate(&merged).is_valid());
    }

    #[test]
    fn id_selector_beats_class_selector() {
        let mut a_fields = base_pair();
        a_fields[0].selector = "h1.title".to_owned();
        let mut b_fields = base_pair();
        b_fields[0].selector = "#product-title".to_owned();

        let merged = SchemaMerger::new().merge(&[schema(a_fields), schema(b_fields)]);
        assert_eq!(merged.field("title").expect("title").selector, "#product-title");
    }

    #[test]
    fn higher_specificity_wins_then_shorter_on_ties() {
        assert!(selector_specificity("#a") > selector_specificity(".a.b.c"));
        assert!(selector_specificity("div.price span") > selector_specificity("span"));
        assert!(is_better_selector(".price", ".product-price-amount-x"));
        assert!(!is_better_selector("span", "div.price"));
    }

    #[test]
    fn structured_attributes_beat_text() {
        let mut a_fields = base_pair();
        a_fields[1].attribute = "text".to_owned();
        let mut b_fields = base_pair();
        b_fields[1].attribute = "content".to_owned();

        let merged = SchemaMerger::new().merge(&[schema(a_fields), schema(b_fields)]);
        assert_eq!(merged.field("price").expect("price").attribute, "content");
    }

    #[test]
    fn required_and_array_flags_are_ored() {
        let mut a_fields = base_pair();
        a_fields.push(field("images", ".gallery img"));
        let mut b_fields = base_pair();
        let mut images = field("images", ".gallery img");
        images.array = true;
        b_fields.push(images);

        let merged = SchemaMerger::new().merge(&[schema(a_fields), schema(b_fields)]);
        assert!(merged.field("images").expect("images").array);
    }

    #[test]
    fn longer_description_is_kept() {
        let mut a_fields = base_pair();
        a_fields[0].description = Some("short".to_owned());
        let mut b_fields = base_pair();
        b_fields[0].description = Some("a considerably longer description".to_owned());

        let merged = SchemaMerger::new().merge(&[schema(a_fields), schema(b_fields)]);
        assert_eq!(
            merged.field("title").expect("title").description.as_deref(),
            Some("a considerably longer description")
        );
    }

    #[test]
    fn single_input_is_corrected_and_returned() {
        let merged = SchemaMerger::new().merge(&[schema(vec![field("brand", ".brand")])]);
        // Correction adds the required fields.
        assert!(merged.field("title").is_some());
        assert!(merged.field("price").is_some());
    }

    #[test]
    fn empty_input_yields_a_valid_minimal_schema() {
        let merged = SchemaMerger::new().merge(&[]);
        assert!(SchemaValidator::new().validate(&merged).is_valid());
    }

    #[test]
    fn low_quality_schemas_are_ignored_when_a_good_one_exists() {
        let good = schema(base_pair());
        let poor = schema(vec![{
            let mut f = field("junk", ".x");
            f.attribute = String::new();
            f
        }]);
        let merged = SchemaMerger::new().merge(&[good, poor]);
        // The poor schema was corrected, scored low, and skipped — its junk
        // field only appears if it cleared the threshold.
        assert!(merged.field("title").is_some());
    }
}
