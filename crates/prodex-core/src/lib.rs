pub mod app_config;
pub mod config;
pub mod llm;
pub mod models;
pub mod price;
pub mod schema;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use llm::{LlmClient, LlmError, LlmParams};
pub use models::{
    now_rfc3339, ProductAttribute, ProductData, ProductImage, ProductPrice, ProductReview,
    ProductVariant,
};
pub use price::parse_price;
pub use schema::{ExtractionSchema, FieldSpec, PriceParsing};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("validation error: {0}")]
    Validation(String),
}
