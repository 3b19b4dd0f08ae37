//! Structural-importance pruning.
//!
//! Keeps text blocks whose structural score clears the threshold. The score
//! combines words-per-tag density with a link-density penalty, plus a small
//! boost when an optional query term appears in the block. Deterministic
//! for a given input.

use super::blocks::{collect_blocks, TextBlock};

const QUERY_BOOST: f64 = 0.2;

pub(crate) fn filter(html: &str, query: Option<&str>, threshold: f64) -> Vec<String> {
    let query_terms: Vec<String> = query
        .map(|q| {
            q.to_lowercase()
                .split_whitespace()
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    collect_blocks(html)
        .into_iter()
        .filter(|block| score(block, &query_terms) >= threshold)
        .map(|block| block.text)
        .collect()
}

fn score(block: &TextBlock, query_terms: &[String]) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let density = block.word_count as f64 / block.tag_count.max(1) as f64;
    #[allow(clippy::cast_precision_loss)]
    let link_density = if block.text.is_empty() {
        0.0
    } else {
        (block.link_chars as f64 / block.text.len() as f64).min(1.0)
    };

    // Density saturates toward 1.0; heavily linked blocks are punished.
    let mut score = (density / (density + 5.0)) * (1.0 - link_density);

    if !query_terms.is_empty() {
        let lowered = block.text.to_lowercase();
        if query_terms.iter().any(|t| lowered.contains(t)) {
            score += QUERY_BOOST;
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_text_outscores_link_lists() {
        let html = concat!(
            "<div>",
            "<p>This product page contains a long descriptive paragraph about the item, ",
            "its build quality, and what is included in the box when it arrives.</p>",
            "<p><a href='/a'>Home</a> <a href='/b'>Shop</a> <a href='/c'>Cart</a></p>",
            "</div>",
        );
        let kept = filter(html, None, 0.5);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].contains("descriptive paragraph"));
    }

    #[test]
    fn query_match_boosts_borderline_blocks() {
        let html = "<p>Battery life details</p>";
        let without = filter(html, None, 0.4);
        let with = filter(html, Some("battery"), 0.4);
        assert!(without.is_empty());
        assert_eq!(with.len(), 1);
    }

    #[test]
    fn zero_threshold_keeps_all_blocks() {
        let html = "<div><p>a b c</p><p><a href='/x'>nav</a></p></div>";
        assert_eq!(filter(html, None, 0.0).len(), 2);
    }

    #[test]
    fn is_deterministic() {
        let html = "<div><p>one two three four</p><p>short</p></div>";
        assert_eq!(filter(html, None, 0.3), filter(html, None, 0.3));
    }
}
