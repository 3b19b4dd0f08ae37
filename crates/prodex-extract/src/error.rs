use thiserror::Error;

/// Schema validation, correction, and cache errors.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema validation failed: {}", errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error("schema cache error: {0}")]
    Cache(#[from] std::io::Error),

    #[error("schema is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Internal extraction errors. These never escape the strategy extractors,
/// which degrade to a `ProductData` with `extraction_success = false`; they
/// exist so the internals can use `?` and log precise causes.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Llm(#[from] prodex_core::LlmError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("malformed extraction payload: {0}")]
    Payload(String),
}
