//! Duplicate detection and merging for extracted products.
//!
//! Duplicates are found two ways: shared identifiers (SKU, UPC, EAN, ISBN,
//! MPN, GTIN — case-insensitive) or weighted text similarity over title,
//! brand, and description. Duplicate groups can then be collapsed with one
//! of three merge strategies.

pub mod similarity;

use std::collections::HashMap;
use std::str::FromStr;

use chrono::DateTime;
use thiserror::Error;

use prodex_core::ProductData;

pub use similarity::ratio as text_similarity;

const ID_FIELDS: &[&str] = &["sku", "upc", "ean", "isbn", "mpn", "gtin"];

const TITLE_WEIGHT: f64 = 0.5;
const BRAND_WEIGHT: f64 = 0.3;
const DESCRIPTION_WEIGHT: f64 = 0.2;

/// How a group of duplicates is collapsed into one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Keep the product with the most recent `extracted_at`.
    Latest,
    /// Keep the product with the most non-null fields.
    MostComplete,
    /// Start from the most complete product and fill its null fields from
    /// the others.
    Combine,
}

impl FromStr for MergeStrategy {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "latest" => Ok(Self::Latest),
            "most_complete" => Ok(Self::MostComplete),
            "combine" => Ok(Self::Combine),
            other => Err(DedupError::UnknownStrategy(other.to_owned())),
        }
    }
}

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("similarity threshold {0} must be within [0, 1]")]
    InvalidThreshold(f64),

    #[error("cannot merge an empty product group")]
    EmptyGroup,

    #[error("unknown merge strategy \"{0}\": expected latest, most_complete, or combine")]
    UnknownStrategy(String),

    #[error("merge produced an invalid product: {0}")]
    InvalidMerge(#[from] serde_json::Error),
}

/// Detects and groups duplicate products.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    similarity_threshold: f64,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
        }
    }
}

impl Deduplicator {
    /// Creates a deduplicator with the given similarity threshold.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::InvalidThreshold`] when `threshold` is outside
    /// `[0, 1]`.
    pub fn new(threshold: f64) -> Result<Self, DedupError> {
        if !(0.0..=1.0).contains(&threshold) || threshold.is_nan() {
            return Err(DedupError::InvalidThreshold(threshold));
        }
        Ok(Self {
            similarity_threshold: threshold,
        })
    }

    #[must_use]
    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    /// Lower-cased identifier map plus normalized brand and title.
    #[must_use]
    pub fn product_signature(&self, product: &ProductData) -> HashMap<String, String> {
        let mut signature = HashMap::new();
        for (field, value) in [
            ("sku", &product.sku),
            ("upc", &product.upc),
            ("ean", &product.ean),
            ("isbn", &product.isbn),
            ("mpn", &product.mpn),
            ("gtin", &product.gtin),
        ] {
            if let Some(value) = value {
                let normalized = value.trim().to_lowercase();
                if !normalized.is_empty() {
                    signature.insert(field.to_owned(), normalized);
                }
            }
        }
        if let Some(brand) = &product.brand {
            signature.insert("brand".to_owned(), brand.trim().to_lowercase());
        }
        signature.insert("title".to_owned(), product.title.trim().to_lowercase());
        signature
    }

    /// Whether any identifier field is present in both products and equal.
    #[must_use]
    pub fn is_duplicate_by_id(&self, a: &ProductData, b: &ProductData) -> bool {
        let sig_a = self.product_signature(a);
        let sig_b = self.product_signature(b);
        for field in ID_FIELDS {
            if let (Some(va), Some(vb)) = (sig_a.get(*field), sig_b.get(*field)) {
                if !va.is_empty() && va == vb {
                    tracing::debug!(field, value = %va, "duplicate detected by identifier");
                    return true;
                }
            }
        }
        false
    }

    /// Weighted similarity in `[0, 1]`. Identifier matches short-circuit to
    /// 1.0; otherwise title (0.5), brand (0.3), and description (0.2)
    /// similarities are combined, with weights only counted when both
    /// products carry the field, and the sum renormalized accordingly.
    #[must_use]
    pub fn calculate_similarity(&self, a: &ProductData, b: &ProductData) -> f64 {
        if self.is_duplicate_by_id(a, b) {
            return 1.0;
        }

        let mut score = TITLE_WEIGHT * text_similarity(&norm(&a.title), &norm(&b.title));
        let mut applied_weight = TITLE_WEIGHT;

        if let (Some(brand_a), Some(brand_b)) = (&a.brand, &b.brand) {
            score += BRAND_WEIGHT * text_similarity(&norm(brand_a), &norm(brand_b));
            applied_weight += BRAND_WEIGHT;
        }
        if let (Some(desc_a), Some(desc_b)) = (&a.description, &b.description) {
            score += DESCRIPTION_WEIGHT * text_similarity(&norm(desc_a), &norm(desc_b));
            applied_weight += DESCRIPTION_WEIGHT;
        }

        score / applied_weight
    }

    #[must_use]
    pub fn is_duplicate_by_similarity(&self, a: &ProductData, b: &ProductData) -> bool {
        self.calculate_similarity(a, b) >= self.similarity_threshold
    }

    /// Greedy duplicate grouping: each unassigned product absorbs every
    /// later product matching it by identifier or similarity. Only groups
    /// with at least two members are returned, as index lists into the
    /// input slice.
    #[must_use]
    pub fn find_duplicates(&self, products: &[ProductData]) -> Vec<Vec<usize>> {
        let mut assigned = vec![false; products.len()];
        let mut groups = Vec::new();

        for i in 0..products.len() {
            if assigned[i] {
                continue;
            }
            let mut group = vec![i];
            assigned[i] = true;
            for j in (i + 1)..products.len() {
                if assigned[j] {
                    continue;
                }
                if self.is_duplicate_by_id(&products[i], &products[j])
                    || self.is_duplicate_by_similarity(&products[i], &products[j])
                {
                    group.push(j);
                    assigned[j] = true;
                }
            }
            if group.len() > 1 {
                groups.push(group);
            }
        }
        groups
    }

    /// Collapses a duplicate group into one product.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::EmptyGroup`] for an empty slice.
    pub fn merge_products(
        &self,
        products: &[ProductData],
        strategy: MergeStrategy,
    ) -> Result<ProductData, DedupError> {
        let first = products.first().ok_or(DedupError::EmptyGroup)?;
        if products.len() == 1 {
            return Ok(first.clone());
        }

        match strategy {
            MergeStrategy::Latest => Ok(self.latest(products).clone()),
            MergeStrategy::MostComplete => Ok(self.most_complete(products).clone()),
            MergeStrategy::Combine => self.combine(products),
        }
    }

    fn latest<'a>(&self, products: &'a [ProductData]) -> &'a ProductData {
        let mut latest = &products[0];
        let mut latest_time = None;
        for product in products {
            let Some(raw) = &product.extracted_at else {
                continue;
            };
            let Ok(time) = DateTime::parse_from_rfc3339(raw) else {
                continue;
            };
            if latest_time.is_none_or(|t| time > t) {
                latest_time = Some(time);
                latest = product;
            }
        }
        latest
    }

    fn most_complete<'a>(&self, products: &'a [ProductData]) -> &'a ProductData {
        let mut best = &products[0];
        let mut best_count = best.filled_field_count();
        for product in &products[1..] {
            let count = product.filled_field_count();
            if count > best_count {
                best = product;
                best_count = count;
            }
        }
        best
    }

    /// Most-complete base with null fields filled in from the others, in
    /// group order.
    fn combine(&self, products: &[ProductData]) -> Result<ProductData, DedupError> {
        let base = self.most_complete(products);
        let mut base_value = serde_json::to_value(base)?;
        let serde_json::Value::Object(base_map) = &mut base_value else {
            return Ok(base.clone());
        };

        for product in products {
            if std::ptr::eq(product, base) {
                continue;
            }
            let serde_json::Value::Object(other) = serde_json::to_value(product)? else {
                continue;
            };
            for (key, value) in other {
                if value.is_null() {
                    continue;
                }
                let missing = base_map.get(&key).is_none_or(serde_json::Value::is_null);
                if missing {
                    base_map.insert(key, value);
                }
            }
        }

        Ok(serde_json::from_value(base_value)?)
    }
}

fn norm(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
#[path = "dedup_test.rs"]
mod tests;
