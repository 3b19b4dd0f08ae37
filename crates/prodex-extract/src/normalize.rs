//! Conversion of raw extractor output into [`ProductData`].
//!
//! Every strategy extractor produces a loosely-typed field map; this module
//! is the single place where that map becomes a product record. It handles
//! dotted price keys (`price.current_price`), string/object/array image
//! forms, numeric coercion, `>`-separated category paths, and image-URL
//! absolutization against the source page.

use serde_json::{Map, Value};
use url::Url;

use prodex_core::{
    now_rfc3339, parse_price, ProductAttribute, ProductData, ProductImage, ProductPrice,
    ProductReview, ProductVariant,
};

/// Builds a [`ProductData`] from a raw field map. Missing titles become
/// `"Unknown Product"`; a missing price becomes zero USD. The original map
/// is preserved in `raw_data`.
#[must_use]
pub fn normalize(raw: &Map<String, Value>, source_url: &str) -> ProductData {
    let title = raw
        .get("title")
        .and_then(value_as_string)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            tracing::warn!(url = source_url, "no title found in extracted content");
            "Unknown Product".to_owned()
        });

    let mut product = ProductData::new(title, extract_price_info(raw));
    product.source = Some(source_url.to_owned());
    product.url = raw
        .get("url")
        .and_then(value_as_string)
        .or_else(|| Some(source_url.to_owned()));
    product.extracted_at = Some(now_rfc3339());
    product.extraction_success = true;

    product.description = raw.get("description").and_then(value_as_string);
    product.short_description = raw.get("short_description").and_then(value_as_string);
    product.brand = raw.get("brand").and_then(value_as_string);
    product.availability = raw.get("availability").and_then(value_as_string);

    product.sku = raw.get("sku").and_then(value_as_string);
    product.upc = raw.get("upc").and_then(value_as_string);
    product.ean = raw.get("ean").and_then(value_as_string);
    product.isbn = raw.get("isbn").and_then(value_as_string);
    product.mpn = raw.get("mpn").and_then(value_as_string);
    product.gtin = raw.get("gtin").and_then(value_as_string);

    product.images = extract_images(raw.get("images"), source_url);

    product.rating = raw.get("rating").and_then(value_as_f64);
    product.review_count = raw
        .get("review_count")
        .and_then(value_as_f64)
        .filter(|n| *n >= 0.0)
        .map(|n| n as u64);

    product.category = extract_category(raw.get("category"));
    product.attributes = extract_attributes(raw.get("attributes"));
    product.reviews = extract_list::<ProductReview>(raw.get("reviews"));
    product.variants = extract_list::<ProductVariant>(raw.get("variants"));

    product.shipping_info = raw.get("shipping_info").and_then(value_as_string);
    product.warranty = raw.get("warranty").and_then(value_as_string);
    product.dimensions = raw.get("dimensions").and_then(value_as_string);
    product.weight = raw.get("weight").and_then(value_as_string);
    product.material = raw.get("material").and_then(value_as_string);
    product.seller = raw.get("seller").and_then(value_as_string);
    product.release_date = raw.get("release_date").and_then(value_as_string);

    product.raw_data = Some(Value::Object(raw.clone()));
    product
}

/// Price from any of the accepted forms: a `price` object, dotted
/// `price.current_price` / `price.currency` keys, or a scalar `price`.
fn extract_price_info(raw: &Map<String, Value>) -> ProductPrice {
    let mut price = ProductPrice::zero();

    if let Some(Value::Object(object)) = raw.get("price") {
        if let Some(current) = object.get("current_price").and_then(value_as_f64) {
            price.current_price = current.max(0.0);
        }
        if let Some(currency) = object.get("currency").and_then(value_as_string) {
            if !currency.is_empty() {
                price.currency = currency;
            }
        }
        price.original_price = object.get("original_price").and_then(value_as_f64);
        price.discount_percentage = object.get("discount_percentage").and_then(value_as_f64);
        price.discount_amount = object.get("discount_amount").and_then(value_as_f64);
        price.price_per_unit = object.get("price_per_unit").and_then(value_as_string);
        return price;
    }

    let scalar = raw
        .get("price.current_price")
        .or_else(|| raw.get("price"));
    match scalar {
        Some(Value::String(text)) => {
            let parsed = parse_price(text);
            price.current_price = parsed.current_price;
            price.currency = parsed.currency;
        }
        Some(value) => {
            if let Some(number) = value_as_f64(value) {
                price.current_price = number.max(0.0);
            }
        }
        None => {}
    }

    let currency = raw
        .get("price.currency")
        .or_else(|| raw.get("currency"))
        .and_then(value_as_string);
    if let Some(currency) = currency {
        if !currency.is_empty() {
            price.currency = currency;
        }
    }

    price.original_price = raw
        .get("price.original_price")
        .or_else(|| raw.get("original_price"))
        .and_then(value_as_f64);
    price.discount_percentage = raw
        .get("price.discount_percentage")
        .or_else(|| raw.get("discount_percentage"))
        .and_then(value_as_f64);

    price
}

/// Images arrive as a URL string, a JSON-encoded list, a list of URL
/// strings, or a list of `{url, alt_text, position}` records.
fn extract_images(value: Option<&Value>, source_url: &str) -> Vec<ProductImage> {
    let Some(value) = value else {
        return Vec::new();
    };

    let items: Vec<Value> = match value {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => items,
            _ => vec![Value::String(text.clone())],
        },
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    };

    let mut images = Vec::new();
    for item in items {
        let image = match item {
            Value::String(url) if !url.is_empty() => Some(ProductImage::new(url)),
            Value::Object(record) => record
                .get("url")
                .and_then(value_as_string)
                .filter(|u| !u.is_empty())
                .map(|url| {
                    let mut image = ProductImage::new(url);
                    image.alt_text = record
                        .get("alt_text")
                        .and_then(value_as_string)
                        .filter(|a| !a.is_empty());
                    image.position = record
                        .get("position")
                        .and_then(value_as_f64)
                        .filter(|p| *p >= 0.0)
                        .map(|p| p as u32);
                    image
                }),
            _ => None,
        };
        if let Some(mut image) = image {
            image.url = absolutize(source_url, &image.url);
            images.push(image);
        }
    }
    images
}

fn extract_category(value: Option<&Value>) -> Option<Vec<String>> {
    match value {
        Some(Value::String(path)) => {
            let parts: Vec<String> = path
                .split('>')
                .map(|part| part.trim().to_owned())
                .filter(|part| !part.is_empty())
                .collect();
            (!parts.is_empty()).then_some(parts)
        }
        Some(Value::Array(items)) => {
            let parts: Vec<String> = items.iter().filter_map(value_as_string).collect();
            (!parts.is_empty()).then_some(parts)
        }
        _ => None,
    }
}

fn extract_attributes(value: Option<&Value>) -> Option<Vec<ProductAttribute>> {
    let Some(Value::Array(items)) = value else {
        return None;
    };
    let mut attributes: Vec<ProductAttribute> = Vec::new();
    for item in items {
        let Value::Object(record) = item else {
            continue;
        };
        let Some(name) = record.get("name").and_then(value_as_string) else {
            continue;
        };
        let Some(attr_value) = record.get("value").and_then(value_as_string) else {
            continue;
        };
        if name.is_empty() || attr_value.is_empty() {
            continue;
        }
        // Attribute names are unique within a product.
        if attributes.iter().any(|a| a.name == name) {
            continue;
        }
        attributes.push(ProductAttribute {
            name,
            value: attr_value,
        });
    }
    (!attributes.is_empty()).then_some(attributes)
}

fn extract_list<T: serde::de::DeserializeOwned>(value: Option<&Value>) -> Option<Vec<T>> {
    let Some(Value::Array(items)) = value else {
        return None;
    };
    let parsed: Vec<T> = items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect();
    (!parsed.is_empty()).then_some(parsed)
}

/// Resolves `href` against `base` so stored image URLs are always absolute.
#[must_use]
pub fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_owned();
    }
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => href.to_owned(),
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || *c == '-')
                .collect();
            let cleaned = if cleaned.contains(',') && !cleaned.contains('.') {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            };
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
