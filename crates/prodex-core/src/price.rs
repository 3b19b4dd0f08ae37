//! Raw price-string parsing.
//!
//! Turns strings like `"$1,299.99"`, `"€19,90"`, or `"1.234,56 EUR"` into a
//! numeric price plus ISO 4217 currency code. Parsing never fails: inputs
//! with no usable number yield a price of `0.0`.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::ProductPrice;

/// Symbol → ISO 4217 mapping. Multi-character symbols come first so `A$`
/// and `C$` are matched before the bare `$`.
const CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("A$", "AUD"),
    ("C$", "CAD"),
    ("$", "USD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
    ("₹", "INR"),
    ("₽", "RUB"),
    ("₩", "KRW"),
];

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+[.,]?\d*").expect("valid number pattern"))
}

/// Parses a raw price string into a [`ProductPrice`].
///
/// The first recognized currency symbol sets the currency (default `USD`)
/// and is removed before number extraction. The numeric part is the first
/// match of `\d+[.,]?\d*`, so it carries at most one separator; anything
/// after a second separator is not consumed. Separator handling on the
/// match:
///
/// - both `,` and `.` present: the right-most is the decimal separator,
///   the other is stripped as a thousands separator;
/// - only `,` present: decimal when exactly two digits follow, otherwise
///   stripped.
///
/// A string whose numeric part cannot be parsed yields `current_price = 0.0`.
#[must_use]
pub fn parse_price(raw: &str) -> ProductPrice {
    let mut text = raw.replace('\u{a0}', " ").trim().to_owned();
    let mut currency = "USD".to_owned();

    for (symbol, code) in CURRENCY_SYMBOLS {
        if text.contains(symbol) {
            currency = (*code).to_owned();
            text = text.replace(symbol, "");
            break;
        }
    }

    let mut price = ProductPrice::new(0.0, currency);

    let Some(matched) = number_pattern().find(&text) else {
        return price;
    };

    let number = normalize_separators(matched.as_str());
    match number.parse::<f64>() {
        Ok(value) if value >= 0.0 => price.current_price = value,
        Ok(_) | Err(_) => {
            tracing::debug!(raw, "failed to parse numeric price, defaulting to 0.0");
        }
    }

    price
}

/// Resolves `,`/`.` ambiguity into a plain `1234.56`-style number string.
fn normalize_separators(number: &str) -> String {
    let has_comma = number.contains(',');
    let has_dot = number.contains('.');

    if has_comma && has_dot {
        let comma_pos = number.rfind(',').unwrap_or(0);
        let dot_pos = number.rfind('.').unwrap_or(0);
        if comma_pos < dot_pos {
            // 1,234.56 — comma is the thousands separator
            number.replace(',', "")
        } else {
            // 1.234,56 — dot separates thousands, comma is decimal
            number.replace('.', "").replace(',', ".")
        }
    } else if has_comma {
        let parts: Vec<&str> = number.split(',').collect();
        if parts.len() == 2 && parts[1].len() == 2 {
            // 19,90 — comma is the decimal separator
            number.replace(',', ".")
        } else {
            // 1,234 — thousands separator
            number.replace(',', "")
        }
    } else {
        number.to_owned()
    }
}
