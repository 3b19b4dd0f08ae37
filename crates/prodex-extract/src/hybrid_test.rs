use prodex_core::{ProductAttribute, ProductImage, ProductPrice};

use super::*;

fn product(title: &str) -> ProductData {
    let mut p = ProductData::new(title, ProductPrice::new(9.99, "USD"));
    p.source = Some("https://example.com/p/1".to_owned());
    p
}

#[test]
fn strategy_parses_from_str() {
    assert_eq!("auto".parse::<Strategy>().expect("known"), Strategy::Auto);
    assert_eq!(
        "auto_schema".parse::<Strategy>().expect("known"),
        Strategy::Auto
    );
    assert_eq!("XPATH".parse::<Strategy>().expect("known"), Strategy::Xpath);
    assert!("magic".parse::<Strategy>().is_err());
}

#[test]
fn merge_priority_is_auto_llm_css_xpath() {
    let mut ranks: Vec<(Strategy, u8)> = [Strategy::Auto, Strategy::Llm, Strategy::Css, Strategy::Xpath]
        .iter()
        .map(|s| (*s, s.merge_rank()))
        .collect();
    ranks.sort_by_key(|(_, r)| *r);
    let order: Vec<Strategy> = ranks.into_iter().map(|(s, _)| s).collect();
    assert_eq!(
        order,
        vec![Strategy::Auto, Strategy::Llm, Strategy::Css, Strategy::Xpath]
    );
}

#[test]
fn merge_unions_images_by_url() {
    let mut auto = product("Alpha");
    auto.images = vec![ProductImage::new("https://example.com/a.jpg")];
    let mut css = product("Alpha");
    css.images = vec![
        ProductImage::new("https://example.com/a.jpg"),
        ProductImage::new("https://example.com/b.jpg"),
    ];

    let merged = merge_results(
        vec![(Strategy::Auto, auto), (Strategy::Css, css)],
        "https://example.com/p/1",
    );
    let urls: Vec<&str> = merged.images.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(urls, vec!["https://example.com/a.jpg", "https://example.com/b.jpg"]);
}

#[test]
fn merge_unions_attributes_by_name() {
    let mut auto = product("Alpha");
    auto.attributes = Some(vec![ProductAttribute {
        name: "Color".to_owned(),
        value: "Black".to_owned(),
    }]);
    let mut xpath = product("Alpha");
    xpath.attributes = Some(vec![
        ProductAttribute {
            name: "Color".to_owned(),
            value: "Anthracite".to_owned(),
        },
        ProductAttribute {
            name: "Size".to_owned(),
            value: "M".to_owned(),
        },
    ]);

    let merged = merge_results(
        vec![(Strategy::Auto, auto), (Strategy::Xpath, xpath)],
        "https://example.com/p/1",
    );
    let attributes = merged.attributes.expect("attributes");
    assert_eq!(attributes.len(), 2);
    // The higher-priority value for the shared name survives.
    assert_eq!(attributes[0].value, "Black");
}

#[test]
fn merge_prefers_the_richer_price() {
    let mut css = product("Alpha");
    css.price = ProductPrice::new(9.99, "USD");
    let mut xpath = product("Alpha");
    xpath.price = ProductPrice::new(9.99, "USD");
    xpath.price.original_price = Some(12.99);
    xpath.price.discount_percentage = Some(23.0);

    let merged = merge_results(
        vec![(Strategy::Css, css), (Strategy::Xpath, xpath)],
        "https://example.com/p/1",
    );
    assert_eq!(merged.price.original_price, Some(12.99));
}

#[test]
fn merge_keeps_the_longer_free_text() {
    let mut auto = product("Alpha");
    auto.description = Some("short".to_owned());
    let mut css = product("Alpha");
    css.description = Some("a much longer and more useful description".to_owned());

    let merged = merge_results(
        vec![(Strategy::Auto, auto), (Strategy::Css, css)],
        "https://example.com/p/1",
    );
    assert_eq!(
        merged.description.as_deref(),
        Some("a much longer and more useful description")
    );
}

#[test]
fn merge_fills_absent_fields_from_lower_priority_results() {
    let auto = product("Alpha");
    let mut css = product("Alpha");
    css.brand = Some("Acme".to_owned());
    css.warranty = Some("2 years".to_owned());

    let merged = merge_results(
        vec![(Strategy::Auto, auto), (Strategy::Css, css)],
        "https://example.com/p/1",
    );
    assert_eq!(merged.brand.as_deref(), Some("Acme"));
    assert_eq!(merged.warranty.as_deref(), Some("2 years"));
}

#[test]
fn merge_sets_fresh_metadata() {
    let mut auto = product("Alpha");
    auto.source = Some("https://stale.example.com".to_owned());
    let css = product("Alpha");

    let merged = merge_results(
        vec![(Strategy::Auto, auto), (Strategy::Css, css)],
        "https://example.com/p/1",
    );
    assert_eq!(merged.source.as_deref(), Some("https://example.com/p/1"));
    assert!(merged.extraction_success);
    assert!(merged.extracted_at.is_some());
}

#[test]
fn merge_is_deterministic_for_the_same_successes() {
    let build = || {
        let mut auto = product("Alpha");
        auto.description = Some("from auto".to_owned());
        let mut css = product("Alpha");
        css.brand = Some("Acme".to_owned());
        vec![(Strategy::Auto, auto), (Strategy::Css, css)]
    };
    let a = merge_results(build(), "https://example.com/p/1");
    let b = merge_results(build(), "https://example.com/p/1");
    assert_eq!(a.title, b.title);
    assert_eq!(a.brand, b.brand);
    assert_eq!(a.description, b.description);
    assert_eq!(a.images, b.images);
}

#[test]
fn priority_order_applies_regardless_of_execution_order() {
    let mut xpath = product("From XPath");
    xpath.description = Some("xpath description".to_owned());
    let mut auto = product("From Auto With A Longer Title");
    auto.description = Some("auto description!".to_owned());

    // XPath listed first, but auto has merge priority: its title is the base
    // and only longer text can displace its fields.
    let merged = merge_results(
        vec![(Strategy::Xpath, xpath), (Strategy::Auto, auto)],
        "https://example.com/p/1",
    );
    assert_eq!(merged.title, "From Auto With A Longer Title");
    assert_eq!(merged.description.as_deref(), Some("auto description!"));
}
