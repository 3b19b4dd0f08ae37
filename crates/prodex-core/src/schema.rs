use serde::{Deserialize, Serialize};

/// Rules for turning a raw price string into a numeric value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceParsing {
    pub currency_symbols: Vec<String>,
    pub decimal_separator: String,
    pub thousands_separator: String,
    pub strip_non_numeric: bool,
}

impl Default for PriceParsing {
    fn default() -> Self {
        Self {
            currency_symbols: ["$", "€", "£", "¥"].map(str::to_owned).to_vec(),
            decimal_separator: ".".to_owned(),
            thousands_separator: ",".to_owned(),
            strip_non_numeric: true,
        }
    }
}

/// One field of an extraction schema: where to find a value in the page
/// and how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    /// CSS selector locating the field's element(s). May be empty when a
    /// generator could not find a candidate for a required field.
    pub selector: String,
    /// Attribute to read from matched elements; `"text"` means text content.
    #[serde(default = "default_attribute")]
    pub attribute: String,
    #[serde(default)]
    pub required: bool,
    /// Whether the field collects every match rather than the first.
    #[serde(default)]
    pub array: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_parsing: Option<PriceParsing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Backup selectors recorded by the generator or enhancer, tried when
    /// the primary selector matches nothing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_selectors: Vec<String>,
    /// Post-processing hint attached by the enhancer (e.g. `"extract_price"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_process: Option<String>,
}

fn default_attribute() -> String {
    "text".to_owned()
}

impl FieldSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: selector.into(),
            attribute: default_attribute(),
            required: false,
            array: false,
            price_parsing: None,
            description: None,
            alternative_selectors: Vec::new(),
            post_process: None,
        }
    }
}

/// A named list of [`FieldSpec`]s describing how to pull each product field
/// out of a page. `title` and `price` are always required; the validator
/// and corrector enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSchema {
    #[serde(default = "default_schema_name")]
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

fn default_schema_name() -> String {
    "Product Extraction Schema".to_owned()
}

impl ExtractionSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_price_parsing_matches_contract() {
        let pp = PriceParsing::default();
        assert_eq!(pp.currency_symbols, vec!["$", "€", "£", "¥"]);
        assert_eq!(pp.decimal_separator, ".");
        assert_eq!(pp.thousands_separator, ",");
        assert!(pp.strip_non_numeric);
    }

    #[test]
    fn field_spec_defaults() {
        let field = FieldSpec::new("brand", ".brand");
        assert_eq!(field.attribute, "text");
        assert!(!field.required);
        assert!(!field.array);
    }

    #[test]
    fn missing_attribute_defaults_to_text_on_deserialize() {
        let field: FieldSpec =
            serde_json::from_str(r#"{"name": "title", "selector": "h1"}"#).expect("deserialize");
        assert_eq!(field.attribute, "text");
    }

    #[test]
    fn schema_field_lookup() {
        let schema = ExtractionSchema::new(
            "test",
            vec![FieldSpec::new("title", "h1"), FieldSpec::new("price", ".price")],
        );
        assert!(schema.field("title").is_some());
        assert!(schema.field("images").is_none());
        assert_eq!(schema.field_names(), vec!["title", "price"]);
    }

    #[test]
    fn schema_roundtrips_through_json() {
        let mut field = FieldSpec::new("price", ".price");
        field.required = true;
        field.price_parsing = Some(PriceParsing::default());
        let schema = ExtractionSchema::new("roundtrip", vec![field]);
        let json = serde_json::to_string(&schema).expect("serialize");
        let decoded: ExtractionSchema = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded, schema);
    }
}
