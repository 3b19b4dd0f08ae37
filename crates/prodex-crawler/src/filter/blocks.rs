//! Block-level text segmentation shared by the BM25 and pruning filters.

use scraper::{ElementRef, Html, Selector};

/// Tags treated as text-bearing blocks. An element only becomes a block
/// when none of its descendants is itself a block candidate, so nested
/// containers don't produce duplicated text.
const BLOCK_SELECTOR: &str =
    "p, li, h1, h2, h3, h4, h5, h6, td, th, dd, dt, blockquote, figcaption, div, section, article";

#[derive(Debug, Clone)]
pub(crate) struct TextBlock {
    pub text: String,
    pub word_count: usize,
    /// Descendant element count, including the block element itself.
    pub tag_count: usize,
    /// Characters of text living inside anchor descendants.
    pub link_chars: usize,
}

/// Extracts leaf text blocks from `html` in document order.
pub(crate) fn collect_blocks(html: &str) -> Vec<TextBlock> {
    let document = Html::parse_document(html);
    let block_selector = Selector::parse(BLOCK_SELECTOR).expect("valid block selector");
    let anchor_selector = Selector::parse("a").expect("valid anchor selector");

    let mut blocks = Vec::new();
    for element in document.select(&block_selector) {
        // Skip containers: only leaf blocks carry their own text.
        if element.select(&block_selector).next().is_some() {
            continue;
        }
        let text = element_text(element);
        if text.is_empty() {
            continue;
        }
        let word_count = text.split_whitespace().count();
        let tag_count = 1 + element
            .descendants()
            .filter(|node| node.value().is_element())
            .count();
        let link_chars = element
            .select(&anchor_selector)
            .map(|a| element_text(a).len())
            .sum();
        blocks.push(TextBlock {
            text,
            word_count,
            tag_count,
            link_chars,
        });
    }
    blocks
}

/// Text content of an element with nested script/style content stripped and
/// surrounding whitespace trimmed.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out.trim().to_owned()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if name != "script" && name != "style" {
                collect_text(child_element, out);
            }
        }
    }
}
