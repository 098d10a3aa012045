//! Embedding providers and the approximate vector index
//!
//! Architecture:
//! - EmbeddingProvider trait for abstraction
//! - GeminiEmbeddingProvider for the hosted API (default)
//! - FastEmbedProvider for local embedding (all-MiniLM-L6-v2, 384-dim)
//! - VectorIndex (HNSW) for candidate generation over large stores
mod gemini;
mod provider;
mod vector_index;

pub use gemini::{GeminiEmbeddingProvider, DEFAULT_GEMINI_EMBEDDING_MODEL};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use vector_index::{SearchResult, VectorIndex, VectorIndexError};

use crate::config::Config;
use crate::error::{QueryError, Result};
use crate::gemini::GeminiTransport;
use crate::runtime::ExecutionContext;
use std::sync::Arc;

/// Build the embedding provider selected by `embedding.provider`
pub fn from_config(
    config: &Config,
    context: Arc<ExecutionContext>,
) -> Result<Box<dyn EmbeddingProvider>> {
    let embedding = &config.embedding;
    match embedding.provider.as_str() {
        "fastembed" => Ok(Box::new(FastEmbedProvider::new(&embedding.model)?)),
        "gemini" => {
            let transport = GeminiTransport::from_config(&config.llm, context)?;
            Ok(Box::new(GeminiEmbeddingProvider::new(
                transport,
                &embedding.model,
                embedding.batch_size,
                embedding.dimension,
            )))
        }
        other => Err(QueryError::InvalidConfigValue {
            path: "embedding.provider".to_string(),
            message: format!("Unknown embedding provider '{}'", other),
        }),
    }
}
