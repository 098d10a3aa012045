//! Text generation clients
//!
//! A [`Generator`] turns a prompt into a completion. Generation stops at the
//! first of the given stop sequences; the stop sequence itself is not
//! included in the returned text.

mod gemini;

pub use gemini::GeminiGenerator;

use crate::config::Config;
use crate::error::QueryError;
use crate::gemini::GeminiTransport;
use crate::runtime::ExecutionContext;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Generation request failed: {0}")]
    Request(String),

    #[error("Generation API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Model returned no candidates{}", reason.as_ref().map(|r| format!(" ({})", r)).unwrap_or_default())]
    Empty { reason: Option<String> },

    #[error("Malformed generation response: {0}")]
    Malformed(String),
}

impl From<crate::gemini::ApiFailure> for GenerationError {
    fn from(failure: crate::gemini::ApiFailure) -> Self {
        use crate::gemini::ApiFailure;
        match failure {
            ApiFailure::Request(msg) => GenerationError::Request(msg),
            ApiFailure::Status { status, message } => GenerationError::Api { status, message },
            ApiFailure::Decode(msg) => GenerationError::Malformed(msg),
        }
    }
}

/// Trait for text generation backends
pub trait Generator: Send + Sync {
    /// Complete `prompt`, halting at any of `stop`
    fn generate(&self, prompt: &str, stop: &[&str]) -> Result<String, GenerationError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Build the generator selected by `llm.provider`
pub fn from_config(
    config: &Config,
    context: Arc<ExecutionContext>,
) -> crate::error::Result<Box<dyn Generator>> {
    match config.llm.provider.as_str() {
        "gemini" => {
            let transport = GeminiTransport::from_config(&config.llm, context)?;
            Ok(Box::new(GeminiGenerator::new(
                transport,
                &config.llm.model,
                config.llm.temperature,
            )))
        }
        other => Err(QueryError::InvalidConfigValue {
            path: "llm.provider".to_string(),
            message: format!("Unknown generation provider '{}'", other),
        }),
    }
}

/// Cut `text` at the earliest stop sequence
///
/// Hosted APIs apply stop sequences server side; this is applied again on the
/// client so every backend honours the same contract.
pub fn truncate_at_stop<'a>(text: &'a str, stop: &[&str]) -> &'a str {
    let cut = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s))
        .min()
        .unwrap_or(text.len());
    &text[..cut]
}
