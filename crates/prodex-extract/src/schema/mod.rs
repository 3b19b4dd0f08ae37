//! Schema lifecycle: validation, correction, generation, merging, and
//! feedback-driven enhancement.

pub mod enhancer;
pub mod generator;
pub mod merger;
pub mod validator;

pub use enhancer::{ExtractionFeedback, SchemaEnhancer};
pub use generator::{DomainKind, SchemaGenerator};
pub use merger::{selector_specificity, SchemaMerger};
pub use validator::{
    default_field, CorrectedSchema, Correction, SchemaReport, SchemaValidator, ValidationReport,
    COMMON_FIELDS, REQUIRED_FIELDS,
};
