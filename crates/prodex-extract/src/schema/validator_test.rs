use serde_json::json;

use super::*;

fn validator() -> SchemaValidator {
    SchemaValidator::new()
}

#[test]
fn valid_fields_list_schema_passes() {
    let schema = json!({
        "name": "test",
        "fields": [
            {"name": "title", "selector": "h1", "required": true},
            {"name": "price", "selector": ".price", "required": true},
        ]
    });
    let report = validator().validate_value(&schema);
    assert!(report.is_valid(), "errors: {:?}", report.errors);
}

#[test]
fn non_object_schema_is_invalid() {
    let report = validator().validate_value(&json!(["not", "a", "schema"]));
    assert!(!report.is_valid());
}

#[test]
fn empty_fields_list_is_invalid() {
    let report = validator().validate_value(&json!({"fields": []}));
    assert!(report.errors.iter().any(|e| e.contains("at least one field")));
}

#[test]
fn missing_required_fields_are_reported() {
    let schema = json!({"fields": [{"name": "brand", "selector": ".brand"}]});
    let report = validator().validate_value(&schema);
    assert!(report.errors.iter().any(|e| e.contains("title")));
    assert!(report.errors.iter().any(|e| e.contains("price")));
}

#[test]
fn invalid_selector_is_reported() {
    let schema = json!({
        "fields": [
            {"name": "title", "selector": "h1["},
            {"name": "price", "selector": ".price"},
        ]
    });
    let report = validator().validate_value(&schema);
    assert!(report.errors.iter().any(|e| e.contains("invalid CSS selector")));
}

#[test]
fn duplicate_field_names_are_reported_once() {
    let schema = json!({
        "fields": [
            {"name": "title", "selector": "h1"},
            {"name": "title", "selector": "h2"},
            {"name": "title", "selector": "h3"},
            {"name": "price", "selector": ".price"},
        ]
    });
    let report = validator().validate_value(&schema);
    let duplicate_errors: Vec<&String> = report
        .errors
        .iter()
        .filter(|e| e.contains("duplicate"))
        .collect();
    assert_eq!(duplicate_errors.len(), 1);
}

#[test]
fn mistyped_flags_are_reported() {
    let schema = json!({
        "fields": [
            {"name": "title", "selector": "h1", "required": "yes"},
            {"name": "price", "selector": ".price", "array": 1},
        ]
    });
    let report = validator().validate_value(&schema);
    assert!(report.errors.iter().any(|e| e.contains("required must be a boolean")));
    assert!(report.errors.iter().any(|e| e.contains("array must be a boolean")));
}

#[test]
fn direct_mapping_schema_with_bare_selectors_validates() {
    let schema = json!({
        "title": "h1",
        "price": ".price"
    });
    let report = validator().validate_value(&schema);
    assert!(report.is_valid(), "errors: {:?}", report.errors);
}

#[test]
fn price_parsing_subfields_are_type_checked() {
    let schema = json!({
        "fields": [
            {"name": "title", "selector": "h1"},
            {
                "name": "price",
                "selector": ".price",
                "price_parsing": {"currency_symbols": "$", "decimal_separator": 5}
            },
        ]
    });
    let report = validator().validate_value(&schema);
    assert!(report
        .errors
        .iter()
        .any(|e| e.contains("currency_symbols must be a list")));
    assert!(report
        .errors
        .iter()
        .any(|e| e.contains("decimal_separator must be a string")));
}

// ---------------------------------------------------------------------------
// Correction
// ---------------------------------------------------------------------------

#[test]
fn correction_of_any_schema_validates() {
    let candidates = vec![
        json!({}),
        json!({"fields": []}),
        json!({"brand": ".brand"}),
        json!({"fields": [{"name": "title", "selector": "h1["}]}),
        json!({"title": "h1", "price": {"selector": ".price"}, "images": {"selector": "img"}}),
        json!(null),
        json!(42),
    ];
    let v = validator();
    for candidate in candidates {
        let corrected = v.correct_value(&candidate);
        let report = v.validate(&corrected.schema);
        assert!(
            report.is_valid(),
            "corrected schema for {candidate} still invalid: {:?}",
            report.errors
        );
    }
}

#[test]
fn bare_string_fields_gain_text_attribute() {
    let corrected = validator().correct_value(&json!({"title": "h1", "price": ".price"}));
    let title = corrected.schema.field("title").expect("title");
    assert_eq!(title.attribute, "text");
    assert!(title.required);
    assert!(corrected
        .corrections
        .iter()
        .any(|c| c.field == "title" && c.action.contains("text")));
}

#[test]
fn invalid_selector_is_replaced_with_registry_default() {
    let schema = json!({
        "fields": [
            {"name": "title", "selector": "h1[["},
            {"name": "price", "selector": ".price"},
        ]
    });
    let corrected = validator().correct_value(&schema);
    let title = corrected.schema.field("title").expect("title");
    assert!(SchemaValidator::is_valid_selector(&title.selector));
    assert!(title.selector.contains("h1"));
}

#[test]
fn unknown_field_gets_class_selector_fallback() {
    let schema = json!({
        "fields": [
            {"name": "title", "selector": "h1"},
            {"name": "price", "selector": ".price"},
            {"name": "subtitle"},
        ]
    });
    let corrected = validator().correct_value(&schema);
    let subtitle = corrected.schema.field("subtitle").expect("subtitle");
    assert_eq!(subtitle.selector, ".subtitle");
}

#[test]
fn price_gains_default_parsing_rules() {
    let corrected = validator().correct_value(&json!({"title": "h1", "price": ".price"}));
    let price = corrected.schema.field("price").expect("price");
    let parsing = price.price_parsing.as_ref().expect("price parsing");
    assert_eq!(parsing.currency_symbols, vec!["$", "€", "£", "¥"]);
    assert_eq!(parsing.decimal_separator, ".");
    assert!(parsing.strip_non_numeric);
}

#[test]
fn images_gain_src_attribute_and_array_flag() {
    let corrected = validator().correct_value(&json!({
        "title": "h1",
        "price": ".price",
        "images": ".gallery img"
    }));
    let images = corrected.schema.field("images").expect("images");
    assert_eq!(images.attribute, "src");
    assert!(images.array);
}

#[test]
fn missing_required_fields_are_added() {
    let corrected = validator().correct_value(&json!({"brand": ".brand"}));
    assert!(corrected.schema.field("title").is_some());
    assert!(corrected.schema.field("price").is_some());
    assert!(corrected
        .corrections
        .iter()
        .any(|c| c.action.contains("added missing required field")));
}

#[test]
fn duplicate_fields_keep_the_first_occurrence() {
    let schema = json!({
        "fields": [
            {"name": "title", "selector": "h1"},
            {"name": "title", "selector": "h2"},
            {"name": "price", "selector": ".price"},
        ]
    });
    let corrected = validator().correct_value(&schema);
    let titles: Vec<&FieldSpec> = corrected
        .schema
        .fields
        .iter()
        .filter(|f| f.name == "title")
        .collect();
    assert_eq!(titles.len(), 1);
    assert_eq!(titles[0].selector, "h1");
}

// ---------------------------------------------------------------------------
// Quality score
// ---------------------------------------------------------------------------

#[test]
fn quality_score_is_within_unit_interval() {
    let v = validator();
    let corrected = v.correct_value(&json!({"title": "h1", "price": ".price"}));
    let score = v.quality_score(&corrected.schema);
    assert!((0.0..=1.0).contains(&score), "got {score}");
}

#[test]
fn richer_schemas_score_higher() {
    let v = validator();
    let sparse = v.correct_value(&json!({"title": "h1", "price": ".p"})).schema;
    let rich = v
        .correct_value(&json!({
            "title": ".product-title h1",
            "price": ".product-price .amount",
            "description": ".product-description",
            "brand": ".brand",
            "images": ".gallery img",
            "sku": ".sku",
            "availability": ".stock"
        }))
        .schema;
    assert!(v.quality_score(&rich) > v.quality_score(&sparse));
}

#[test]
fn empty_schema_scores_zero() {
    let v = validator();
    let schema = prodex_core::ExtractionSchema::new("empty", Vec::new());
    assert!((v.quality_score(&schema) - 0.0).abs() < f64::EPSILON);
}

#[test]
fn strict_mode_surfaces_validation_errors() {
    let schema = prodex_core::ExtractionSchema::new(
        "bad",
        vec![FieldSpec::new("brand", ".brand")],
    );
    let result = SchemaValidator::strict().validate_strict(&schema);
    assert!(matches!(
        result,
        Err(crate::error::SchemaError::Validation { .. })
    ));
}

#[test]
fn report_combines_validity_and_score() {
    let report = validator().generate_report(&json!({"title": "h1", "price": ".price"}));
    assert!(report.is_valid);
    assert!(report.quality_score > 0.0);
    assert_eq!(report.total_fields, 2);
    assert_eq!(report.required_fields, 2);
}
