use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single product image, ordered by `position` within the gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    /// Absolute URL of the image. Relative URLs are resolved against the
    /// source page URL during normalization.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

impl ProductImage {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            alt_text: None,
            position: None,
        }
    }
}

/// Price information for a product or variant.
///
/// `current_price` and `currency` are always present; everything else is
/// only populated when the page exposes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPrice {
    pub current_price: f64,
    /// ISO 4217 currency code (e.g., `"USD"`).
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<f64>,
    /// Price per unit for measurement-based products, e.g. `"$1.50/oz"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_unit: Option<String>,
}

impl ProductPrice {
    #[must_use]
    pub fn new(current_price: f64, currency: impl Into<String>) -> Self {
        Self {
            current_price,
            currency: currency.into(),
            original_price: None,
            discount_percentage: None,
            discount_amount: None,
            price_per_unit: None,
        }
    }

    /// Zero-priced USD placeholder used by failure values.
    #[must_use]
    pub fn zero() -> Self {
        Self::new(0.0, "USD")
    }

    /// Number of populated sub-fields, used when merging strategy results
    /// to keep the richer price object.
    #[must_use]
    pub fn filled_field_count(&self) -> usize {
        let mut count = 2; // current_price + currency are always present
        count += usize::from(self.original_price.is_some());
        count += usize::from(self.discount_percentage.is_some());
        count += usize::from(self.discount_amount.is_some());
        count += usize::from(self.price_per_unit.is_some());
        count
    }
}

/// A name/value attribute pair (color, size, material, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAttribute {
    pub name: String,
    pub value: String,
}

/// A purchasable variant of a product.
///
/// Variants are a tagged record carrying only their own attributes, price,
/// image, and availability — they never nest a full [`ProductData`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductVariant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<ProductAttribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<ProductPrice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ProductImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
}

/// A single customer review.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductReview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_purchase: Option<bool>,
}

/// The canonical extraction output: one product scraped from one URL.
///
/// Created by an extractor, mutated only through the storage engine's
/// update path (which bumps `version`), and destroyed by delete. Extraction
/// failures are represented as a value with `extraction_success = false`
/// rather than an error — see [`ProductData::failed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductData {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub price: ProductPrice,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ProductImage>,

    // Identifiers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ean: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gtin: Option<String>,

    /// Breadcrumb path, outermost category first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Average rating, distinct from the individual `reviews` list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<ProductReview>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variants: Option<Vec<ProductVariant>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<ProductAttribute>>,

    // Supplementary metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warranty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,

    // Bookkeeping
    /// Extraction timestamp, RFC 3339.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<String>,
    /// Origin URL of the extraction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Raw extractor output prior to normalization, kept for debugging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    pub extraction_success: bool,
    /// Monotonically increasing storage version, starting at 1. Bumped by
    /// the storage engine on every update; never decreases.
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    1
}

impl ProductData {
    /// Creates a minimal successful product with the given title and price.
    #[must_use]
    pub fn new(title: impl Into<String>, price: ProductPrice) -> Self {
        Self {
            title: title.into(),
            description: None,
            short_description: None,
            brand: None,
            price,
            images: Vec::new(),
            sku: None,
            upc: None,
            ean: None,
            isbn: None,
            mpn: None,
            gtin: None,
            category: None,
            availability: None,
            url: None,
            rating: None,
            review_count: None,
            reviews: None,
            variants: None,
            attributes: None,
            shipping_info: None,
            warranty: None,
            dimensions: None,
            weight: None,
            material: None,
            seller: None,
            release_date: None,
            extracted_at: None,
            source: None,
            raw_data: None,
            extraction_success: true,
            version: 1,
        }
    }

    /// The user-visible failure value: extraction never raises, it returns
    /// this record with `extraction_success = false` and a zero USD price.
    #[must_use]
    pub fn failed(source: impl Into<String>, title: impl Into<String>) -> Self {
        let mut product = Self::new(title, ProductPrice::zero());
        product.extraction_success = false;
        product.source = Some(source.into());
        product.extracted_at = Some(now_rfc3339());
        product
    }

    /// Number of non-null top-level fields, used by the deduplicator's
    /// most-complete merge strategy.
    #[must_use]
    pub fn filled_field_count(&self) -> usize {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => {
                map.values().filter(|v| !v.is_null()).count()
            }
            _ => 0,
        }
    }
}

/// Current UTC time formatted as RFC 3339 with seconds precision — the
/// timestamp format used everywhere in the persisted data.
#[must_use]
pub fn now_rfc3339() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_product() -> ProductData {
        let mut product = ProductData::new(
            "Alpha Widget",
            ProductPrice::new(9.99, "USD"),
        );
        product.brand = Some("Acme".to_string());
        product.sku = Some("AW-001".to_string());
        product.images = vec![ProductImage::new("https://example.com/a.jpg")];
        product.source = Some("https://example.com/p/1".to_string());
        product
    }

    #[test]
    fn failed_product_has_failure_markers() {
        let product = ProductData::failed("https://example.com/p/1", "Extraction Failed");
        assert!(!product.extraction_success);
        assert_eq!(product.title, "Extraction Failed");
        assert!((product.price.current_price - 0.0).abs() < f64::EPSILON);
        assert_eq!(product.price.currency, "USD");
        assert_eq!(product.source.as_deref(), Some("https://example.com/p/1"));
        assert!(product.extracted_at.is_some());
    }

    #[test]
    fn new_product_starts_at_version_one() {
        assert_eq!(sample_product().version, 1);
    }

    #[test]
    fn serde_roundtrip_preserves_fields() {
        let product = sample_product();
        let json = serde_json::to_string(&product).expect("serialize");
        let decoded: ProductData = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded, product);
    }

    #[test]
    fn none_fields_are_omitted_from_json() {
        let product = sample_product();
        let value = serde_json::to_value(&product).expect("serialize");
        let map = value.as_object().expect("object");
        assert!(!map.contains_key("upc"));
        assert!(!map.contains_key("warranty"));
        assert!(map.contains_key("sku"));
    }

    #[test]
    fn deserializes_without_bookkeeping_fields() {
        // Extractor output and LLM replies often omit the bookkeeping keys.
        let json = r#"{"title": "X", "price": {"current_price": 1.5, "currency": "EUR"}}"#;
        let decoded: ProductData = serde_json::from_str(json).expect("deserialize");
        assert!(decoded.extraction_success);
        assert_eq!(decoded.version, 1);
    }

    #[test]
    fn filled_field_count_counts_non_null_fields() {
        let minimal = ProductData::new("X", ProductPrice::zero());
        let fuller = sample_product();
        assert!(fuller.filled_field_count() > minimal.filled_field_count());
    }

    #[test]
    fn price_filled_field_count() {
        let mut price = ProductPrice::new(10.0, "USD");
        assert_eq!(price.filled_field_count(), 2);
        price.original_price = Some(12.0);
        price.discount_percentage = Some(16.7);
        assert_eq!(price.filled_field_count(), 4);
    }
}
