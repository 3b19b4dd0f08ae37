//! BM25 relevance filtering.
//!
//! Scores each block-level text chunk against the query with Okapi BM25
//! (k1 = 1.2, b = 0.75) and keeps chunks at or above the threshold. Fully
//! deterministic for a given input.

use std::collections::HashMap;

use super::blocks::collect_blocks;

const K1: f64 = 1.2;
const B: f64 = 0.75;

pub(crate) fn filter(html: &str, query: &str, threshold: f64) -> Vec<String> {
    let blocks = collect_blocks(html);
    if blocks.is_empty() {
        return Vec::new();
    }

    let query_terms = tokenize(query);
    if query_terms.is_empty() {
        return blocks.into_iter().map(|b| b.text).collect();
    }

    let tokenized: Vec<Vec<String>> = blocks.iter().map(|b| tokenize(&b.text)).collect();
    #[allow(clippy::cast_precision_loss)]
    let doc_count = tokenized.len() as f64;
    #[allow(clippy::cast_precision_loss)]
    let avg_len = tokenized.iter().map(Vec::len).sum::<usize>() as f64 / doc_count;

    // Document frequency per query term.
    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for term in &query_terms {
        let df = tokenized
            .iter()
            .filter(|doc| doc.iter().any(|t| t == term))
            .count();
        doc_freq.insert(term.as_str(), df);
    }

    let mut kept = Vec::new();
    for (block, doc) in blocks.iter().zip(&tokenized) {
        let score = bm25_score(&query_terms, doc, &doc_freq, doc_count, avg_len);
        if score >= threshold {
            kept.push(block.text.clone());
        }
    }
    kept
}

fn bm25_score(
    query_terms: &[String],
    doc: &[String],
    doc_freq: &HashMap<&str, usize>,
    doc_count: f64,
    avg_len: f64,
) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let doc_len = doc.len() as f64;
    let mut score = 0.0;
    for term in query_terms {
        #[allow(clippy::cast_precision_loss)]
        let tf = doc.iter().filter(|t| *t == term).count() as f64;
        if tf == 0.0 {
            continue;
        }
        #[allow(clippy::cast_precision_loss)]
        let df = doc_freq.get(term.as_str()).copied().unwrap_or(0) as f64;
        let idf = ((doc_count - df + 0.5) / (df + 0.5) + 1.0).ln();
        let denom = tf + K1 * (1.0 - B + B * doc_len / avg_len.max(1.0));
        score += idf * tf * (K1 + 1.0) / denom;
    }
    score
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = concat!(
        "<div>",
        "<p>Premium wireless headphones with noise cancellation</p>",
        "<p>Free shipping on orders over fifty dollars</p>",
        "<p>Headphones ship in two business days</p>",
        "</div>",
    );

    #[test]
    fn relevant_blocks_score_above_irrelevant_ones() {
        let kept = filter(HTML, "wireless headphones", 0.5);
        assert!(kept
            .iter()
            .any(|c| c.contains("wireless headphones")));
        assert!(!kept.iter().any(|c| c.contains("Free shipping")));
    }

    #[test]
    fn zero_threshold_keeps_everything() {
        let kept = filter(HTML, "headphones", 0.0);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn empty_query_passes_all_blocks_through() {
        let kept = filter(HTML, "", 1.0);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn is_deterministic() {
        let a = filter(HTML, "shipping", 0.2);
        let b = filter(HTML, "shipping", 0.2);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_html_yields_nothing() {
        assert!(filter("", "anything", 0.0).is_empty());
    }
}
