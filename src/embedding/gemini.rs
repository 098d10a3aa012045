//! Hosted embedding provider backed by the Gemini API

use super::provider::{ensure_non_empty, EmbeddingError, EmbeddingProvider};
use crate::gemini::{qualified_model, ApiFailure, GeminiTransport};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const DEFAULT_GEMINI_EMBEDDING_MODEL: &str = "models/gemini-embedding-001";

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

impl From<ApiFailure> for EmbeddingError {
    fn from(failure: ApiFailure) -> Self {
        EmbeddingError::GenerationError(failure.to_string())
    }
}

/// Embedding provider calling `embedContent` / `batchEmbedContents`
///
/// When no dimension is configured the first response fixes it, and every
/// later vector is checked against it.
pub struct GeminiEmbeddingProvider {
    transport: GeminiTransport,
    model: String,
    batch_size: usize,
    configured_dimension: Option<usize>,
    observed_dimension: OnceLock<usize>,
}

impl GeminiEmbeddingProvider {
    pub fn new(
        transport: GeminiTransport,
        model: &str,
        batch_size: usize,
        dimension: Option<usize>,
    ) -> Self {
        let model = if model.trim().is_empty() {
            DEFAULT_GEMINI_EMBEDDING_MODEL.to_string()
        } else {
            qualified_model(model.trim())
        };
        tracing::info!("Using hosted embedding model: {}", model);

        Self {
            transport,
            model,
            batch_size: batch_size.max(1),
            configured_dimension: dimension,
            observed_dimension: OnceLock::new(),
        }
    }

    fn request<'a>(&self, text: &'a str) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: self.model.clone(),
            content: Content {
                parts: vec![Part { text }],
            },
            output_dimensionality: self.configured_dimension,
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), EmbeddingError> {
        let expected = match self.configured_dimension {
            Some(dimension) => dimension,
            None => *self.observed_dimension.get_or_init(|| vector.len()),
        };
        if vector.len() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = BatchEmbedRequest {
            requests: texts.iter().map(|t| self.request(t)).collect(),
        };
        let response: BatchEmbedResponse =
            self.transport
                .post(&self.model, "batchEmbedContents", &body)?;

        if response.embeddings.len() != texts.len() {
            return Err(EmbeddingError::GenerationError(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        let vectors: Vec<Vec<f32>> = response.embeddings.into_iter().map(|e| e.values).collect();
        for vector in &vectors {
            self.check_dimension(vector)?;
        }
        Ok(vectors)
    }
}

impl EmbeddingProvider for GeminiEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "Cannot embed empty text".to_string(),
            ));
        }

        let response: EmbedContentResponse =
            self.transport
                .post(&self.model, "embedContent", &self.request(text))?;
        self.check_dimension(&response.embedding.values)?;
        Ok(response.embedding.values)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        ensure_non_empty(texts)?;

        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            tracing::debug!("Embedding batch of {} texts", chunk.len());
            vectors.extend(self.embed_chunk(chunk)?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.configured_dimension
            .or_else(|| self.observed_dimension.get().copied())
            .unwrap_or(0)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
