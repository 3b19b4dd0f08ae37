pub mod auto;
pub mod css;
pub mod error;
pub mod hybrid;
pub mod llm;
pub mod normalize;
pub mod prompts;
pub mod schema;
pub mod xpath;

pub use auto::AutoExtractor;
pub use css::{CssExtractor, FieldSelector, SelectorConfig};
pub use error::{ExtractError, SchemaError};
pub use hybrid::{HybridConfig, HybridExtractor, Strategy};
pub use llm::LlmExtractor;
pub use normalize::normalize;
pub use schema::{
    DomainKind, ExtractionFeedback, SchemaEnhancer, SchemaGenerator, SchemaMerger, SchemaValidator,
};
pub use xpath::{FieldXPath, XPathConfig, XPathExtractor};
