//! LLM provider contract.
//!
//! The pipeline consumes a text-completion provider through [`LlmClient`]
//! only — schema generation, LLM content filtering, and LLM extraction all
//! go through `complete`. No provider implementation ships in the core;
//! front-ends wire one in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Generation parameters forwarded to the provider on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for LlmParams {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_owned(),
            temperature: 0.0,
            max_tokens: 2000,
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM provider error: {0}")]
    Provider(String),

    #[error("malformed LLM reply: {0}")]
    MalformedReply(String),
}

/// Stateless text-completion collaborator.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Submits `prompt` and returns the raw completion text.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Provider`] when the provider call fails.
    async fn complete(&self, prompt: &str, params: &LlmParams) -> Result<String, LlmError>;
}
