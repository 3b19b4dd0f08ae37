use std::sync::Arc;

use async_trait::async_trait;

use prodex_core::{LlmClient, LlmError, LlmParams};

use super::*;

const PRODUCT_HTML: &str = concat!(
    "<html><body>",
    "<div class=\"product\"><span class=\"price\">€19,90</span></div>",
    "<div class=\"footer\"><span class=\"price\">hidden</span></div>",
    "</body></html>",
);

struct CannedLlm(String);

#[async_trait]
impl LlmClient for CannedLlm {
    async fn complete(&self, _prompt: &str, _params: &LlmParams) -> Result<String, LlmError> {
        Ok(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// Individual filters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn css_filter_extracts_trimmed_text() {
    let filter = ContentFilter::css(".price", true).expect("valid selector");
    let fragments = filter
        .apply("<div class=\"price\">  $9.99  </div>")
        .await
        .expect("css apply");
    assert_eq!(fragments, vec!["$9.99"]);
}

#[tokio::test]
async fn css_filter_returns_subtree_html_when_not_extracting_text() {
    let filter = ContentFilter::css(".price", false).expect("valid selector");
    let fragments = filter
        .apply("<div class=\"price\"><b>$9.99</b></div>")
        .await
        .expect("css apply");
    assert_eq!(fragments.len(), 1);
    assert!(fragments[0].contains("<b>$9.99</b>"));
}

#[test]
fn invalid_css_selector_is_rejected_at_construction() {
    assert!(matches!(
        ContentFilter::css("div[", true),
        Err(FilterError::InvalidSelector { .. })
    ));
}

#[tokio::test]
async fn xpath_filter_matches_attribute_predicates() {
    let filter = ContentFilter::xpath("//div[@class='product']", true).expect("supported xpath");
    let fragments = filter.apply(PRODUCT_HTML).await.expect("xpath apply");
    assert_eq!(fragments, vec!["€19,90"]);
}

#[tokio::test]
async fn xpath_attribute_extraction_returns_attribute_values() {
    let filter = ContentFilter::xpath("//img/@src", true).expect("supported xpath");
    let fragments = filter
        .apply("<img src=\"/a.jpg\"><img src=\"/b.jpg\">")
        .await
        .expect("xpath apply");
    assert_eq!(fragments, vec!["/a.jpg", "/b.jpg"]);
}

#[tokio::test]
async fn regex_filter_returns_matches_without_replacement() {
    let filter = ContentFilter::regex(r"\$\d+\.\d{2}", None).expect("valid pattern");
    let fragments = filter
        .apply("was $10.00 now $8.50")
        .await
        .expect("regex apply");
    assert_eq!(fragments, vec!["$10.00", "$8.50"]);
}

#[tokio::test]
async fn regex_filter_joins_multiple_capture_groups() {
    let filter = ContentFilter::regex(r"(\w+): (\d+)", None).expect("valid pattern");
    let fragments = filter.apply("width: 10, height: 20").await.expect("regex apply");
    assert_eq!(fragments, vec!["width 10", "height 20"]);
}

#[tokio::test]
async fn regex_filter_substitutes_when_replacement_is_set() {
    let filter =
        ContentFilter::regex(r"<[^>]+>", Some(String::new())).expect("valid pattern");
    let fragments = filter.apply("<b>bold</b> text").await.expect("regex apply");
    assert_eq!(fragments, vec!["bold text"]);
}

#[test]
fn invalid_regex_is_rejected_at_construction() {
    assert!(matches!(
        ContentFilter::regex("(unclosed", None),
        Err(FilterError::InvalidPattern(_))
    ));
}

#[test]
fn negative_threshold_is_rejected() {
    assert!(matches!(
        ContentFilter::bm25("query", -1.0),
        Err(FilterError::InvalidThreshold { .. })
    ));
    assert!(ContentFilter::pruning(None, f64::NAN).is_err());
}

#[tokio::test]
async fn llm_filter_parses_json_array_replies() {
    let client = Arc::new(CannedLlm(r#"["fragment one", "fragment two"]"#.to_owned()));
    let filter = ContentFilter::llm("keep product info", client, LlmParams::default());
    let fragments = filter.apply("<p>ignored</p>").await.expect("llm apply");
    assert_eq!(fragments, vec!["fragment one", "fragment two"]);
}

#[tokio::test]
async fn llm_filter_falls_back_to_blank_line_chunks() {
    let client = Arc::new(CannedLlm("first chunk\n\nsecond chunk\n".to_owned()));
    let filter = ContentFilter::llm("keep product info", client, LlmParams::default());
    let fragments = filter.apply("<p>ignored</p>").await.expect("llm apply");
    assert_eq!(fragments, vec!["first chunk", "second chunk"]);
}

#[tokio::test]
async fn llm_filter_strips_code_fences() {
    let client = Arc::new(CannedLlm("```json\n[\"only\"]\n```".to_owned()));
    let filter = ContentFilter::llm("keep", client, LlmParams::default());
    let fragments = filter.apply("<p>x</p>").await.expect("llm apply");
    assert_eq!(fragments, vec!["only"]);
}

// ---------------------------------------------------------------------------
// Chains
// ---------------------------------------------------------------------------

fn css(selector: &str, extract_text: bool) -> ContentFilter {
    ContentFilter::css(selector, extract_text).expect("valid selector")
}

#[test]
fn empty_chain_is_rejected() {
    assert!(matches!(
        FilterChain::new(Vec::new(), ChainStrategy::Sequence, None),
        Err(FilterError::EmptyChain)
    ));
}

#[test]
fn unknown_strategy_string_is_rejected() {
    assert!(matches!(
        "FIRST".parse::<ChainStrategy>(),
        Err(FilterError::UnknownStrategy(_))
    ));
    assert_eq!("sequence".parse::<ChainStrategy>().expect("known"), ChainStrategy::Sequence);
}

#[tokio::test]
async fn sequence_chain_narrows_to_the_price() {
    let chain = FilterChain::new(
        vec![css(".product", false), css(".price", true)],
        ChainStrategy::Sequence,
        None,
    )
    .expect("non-empty chain");
    let fragments = chain.apply(PRODUCT_HTML).await.expect("chain apply");
    assert_eq!(fragments, vec!["€19,90"]);
}

#[tokio::test]
async fn sequence_chain_short_circuits_on_empty_stage() {
    let chain = FilterChain::new(
        vec![css(".missing", false), css(".price", true)],
        ChainStrategy::Sequence,
        None,
    )
    .expect("non-empty chain");
    let fragments = chain.apply(PRODUCT_HTML).await.expect("chain apply");
    assert!(fragments.is_empty());
}

#[tokio::test]
async fn all_chain_intersects_outputs() {
    let html = "<div><p class=\"a b\">both</p><p class=\"a\">only a</p></div>";
    let chain = FilterChain::new(
        vec![css(".a", true), css(".b", true)],
        ChainStrategy::All,
        None,
    )
    .expect("non-empty chain");
    let fragments = chain.apply(html).await.expect("chain apply");
    assert_eq!(fragments, vec!["both"]);
}

#[tokio::test]
async fn any_chain_unions_outputs() {
    let html = "<div><p class=\"a\">alpha</p><p class=\"b\">beta</p></div>";
    let chain = FilterChain::new(
        vec![css(".a", true), css(".b", true)],
        ChainStrategy::Any,
        None,
    )
    .expect("non-empty chain");
    let fragments = chain.apply(html).await.expect("chain apply");
    assert_eq!(fragments, vec!["alpha", "beta"]);
}

#[tokio::test]
async fn all_and_any_are_commutative_in_filter_order() {
    let html = "<div><p class=\"a b\">x</p><p class=\"b\">y</p><p class=\"a\">z</p></div>";
    for strategy in [ChainStrategy::All, ChainStrategy::Any] {
        let forward = FilterChain::new(
            vec![css(".a", true), css(".b", true)],
            strategy,
            None,
        )
        .expect("chain");
        let reversed = FilterChain::new(
            vec![css(".b", true), css(".a", true)],
            strategy,
            None,
        )
        .expect("chain");
        assert_eq!(
            forward.apply(html).await.expect("apply"),
            reversed.apply(html).await.expect("apply"),
            "{strategy} must be order-independent"
        );
    }
}

#[tokio::test]
async fn sequence_is_not_commutative() {
    // .product then .price finds the nested price; .price then .product finds
    // nothing because the price fragment no longer contains a .product node.
    let forward = FilterChain::new(
        vec![css(".product", false), css(".price", true)],
        ChainStrategy::Sequence,
        None,
    )
    .expect("chain");
    let reversed = FilterChain::new(
        vec![css(".price", false), css(".product", true)],
        ChainStrategy::Sequence,
        None,
    )
    .expect("chain");
    let a = forward.apply(PRODUCT_HTML).await.expect("apply");
    let b = reversed.apply(PRODUCT_HTML).await.expect("apply");
    assert_ne!(a, b);
}

#[tokio::test]
async fn chains_nest_inside_chains() {
    let inner = FilterChain::new(
        vec![css(".product", false)],
        ChainStrategy::Sequence,
        Some("inner".to_owned()),
    )
    .expect("inner chain");
    let outer = FilterChain::new(
        vec![ContentFilter::Chain(inner), css(".price", true)],
        ChainStrategy::Sequence,
        None,
    )
    .expect("outer chain");
    let fragments = outer.apply(PRODUCT_HTML).await.expect("apply");
    assert_eq!(fragments, vec!["€19,90"]);
}
