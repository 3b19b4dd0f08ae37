//! Minimal XPath support, implemented by translation to CSS selectors.
//!
//! Only the subset an e-commerce extraction schema realistically uses is
//! supported; anything else is rejected at construction time:
//!
//! - descendant steps: `//div`, `//div//img`
//! - child steps: `//div[@class='product']/span`
//! - attribute predicates: `[@class='price']`, `[@data-sku]`
//! - trailing value extraction: `/text()`, `/@src`

use std::sync::OnceLock;

use regex::Regex;
use scraper::Selector;

use crate::error::FilterError;

/// A translated XPath expression: a CSS selector plus how to read the
/// matched elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPathQuery {
    pub css: String,
    /// `Some(attr)` when the expression ended in `/@attr`.
    pub attribute: Option<String>,
    /// `true` when the expression ended in `/text()`.
    pub text_only: bool,
}

fn step_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^([A-Za-z][\w-]*|\*)(?:\[@([A-Za-z_][\w-]*)(?:=(['"])([^'"]*)\3)?\])?$"#)
            .expect("valid step pattern")
    })
}

/// Translates `expression` into an [`XPathQuery`].
///
/// # Errors
///
/// Returns [`FilterError::UnsupportedXPath`] for anything outside the
/// supported subset, including expressions whose translation is not a valid
/// CSS selector.
pub fn translate_xpath(expression: &str) -> Result<XPathQuery, FilterError> {
    let unsupported = || FilterError::UnsupportedXPath {
        expression: expression.to_owned(),
    };

    let mut remaining = expression.trim();
    if !remaining.starts_with("//") {
        return Err(unsupported());
    }

    let mut text_only = false;
    let mut attribute = None;
    if let Some(stripped) = remaining.strip_suffix("/text()") {
        text_only = true;
        remaining = stripped;
    } else if let Some(at_pos) = remaining.rfind("/@") {
        let attr = &remaining[at_pos + 2..];
        if attr.is_empty() || !attr.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
            return Err(unsupported());
        }
        attribute = Some(attr.to_owned());
        remaining = &remaining[..at_pos];
    }

    // Descendant groups are separated by `//`; steps within a group by `/`.
    let mut css_parts: Vec<String> = Vec::new();
    for group in remaining.split("//").skip(1) {
        if group.is_empty() {
            return Err(unsupported());
        }
        let mut child_parts: Vec<String> = Vec::new();
        for step in group.split('/') {
            child_parts.push(translate_step(step).ok_or_else(unsupported)?);
        }
        css_parts.push(child_parts.join(" > "));
    }

    if css_parts.is_empty() {
        return Err(unsupported());
    }

    let css = css_parts.join(" ");
    if Selector::parse(&css).is_err() {
        return Err(unsupported());
    }

    Ok(XPathQuery {
        css,
        attribute,
        text_only,
    })
}

fn translate_step(step: &str) -> Option<String> {
    let captures = step_pattern().captures(step.trim())?;
    let tag = captures.get(1).map(|m| m.as_str())?;
    let mut css = tag.to_owned();
    if let Some(attr) = captures.get(2) {
        match captures.get(4) {
            Some(value) => css.push_str(&format!("[{}=\"{}\"]", attr.as_str(), value.as_str())),
            None => css.push_str(&format!("[{}]", attr.as_str())),
        }
    }
    Some(css)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_descendant_tag() {
        let q = translate_xpath("//h1").expect("supported");
        assert_eq!(q.css, "h1");
        assert!(q.attribute.is_none());
        assert!(!q.text_only);
    }

    #[test]
    fn attribute_value_predicate() {
        let q = translate_xpath("//div[@class='product']").expect("supported");
        assert_eq!(q.css, "div[class=\"product\"]");
    }

    #[test]
    fn bare_attribute_predicate() {
        let q = translate_xpath("//span[@data-sku]").expect("supported");
        assert_eq!(q.css, "span[data-sku]");
    }

    #[test]
    fn nested_descendant_steps() {
        let q = translate_xpath("//div[@class='gallery']//img").expect("supported");
        assert_eq!(q.css, "div[class=\"gallery\"] img");
    }

    #[test]
    fn child_steps_become_direct_child_combinators() {
        let q = translate_xpath("//div[@class='product']/span").expect("supported");
        assert_eq!(q.css, "div[class=\"product\"] > span");
    }

    #[test]
    fn trailing_text_function() {
        let q = translate_xpath("//h1/text()").expect("supported");
        assert_eq!(q.css, "h1");
        assert!(q.text_only);
    }

    #[test]
    fn trailing_attribute_extraction() {
        let q = translate_xpath("//img[@class='main']/@src").expect("supported");
        assert_eq!(q.css, "img[class=\"main\"]");
        assert_eq!(q.attribute.as_deref(), Some("src"));
    }

    #[test]
    fn wildcard_tag() {
        let q = translate_xpath("//*[@itemprop='price']").expect("supported");
        assert_eq!(q.css, "*[itemprop=\"price\"]");
    }

    #[test]
    fn relative_expressions_are_rejected() {
        assert!(matches!(
            translate_xpath("div/span"),
            Err(FilterError::UnsupportedXPath { .. })
        ));
    }

    #[test]
    fn positional_predicates_are_rejected() {
        assert!(matches!(
            translate_xpath("//div[1]"),
            Err(FilterError::UnsupportedXPath { .. })
        ));
    }

    #[test]
    fn function_predicates_are_rejected() {
        assert!(translate_xpath("//div[contains(@class,'x')]").is_err());
    }
}
