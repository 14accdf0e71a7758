//! Embedding generation using LLM providers.
//!
//! This module converts text into vector embeddings using provider
//! embedding models.

use crate::provider::{Provider, ProviderError};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider API returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The API response contained no embeddings.
    #[error("No embeddings returned")]
    NoEmbeddings,

    #[error("Expected {expected} embeddings, got {found}")]
    CountMismatch { expected: usize, found: usize },

    /// A vector's length differs from the configured size.
    #[error("Embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Generates vector embeddings for text using a provider embedding model.
///
/// Common embedding models:
/// - `nomic-embed-text` - 768-dimensional embeddings, good general purpose
/// - `mxbai-embed-large` - 1024-dimensional embeddings, higher quality
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn Provider>,
    model: String,
    dimensions: Option<usize>,
}

impl Embedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, dimensions: Option<usize>) -> Self {
        Self {
            provider,
            model: model.into(),
            dimensions,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Configured vector size, if known ahead of the first call.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Generates a vector embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The embedding endpoint is unreachable
    /// - The model is not available
    /// - The API returns no embeddings
    /// - The vector does not have the configured number of dimensions
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.provider.embed(text, &self.model).await?;
        if embedding.is_empty() {
            return Err(EmbedderError::NoEmbeddings);
        }
        check_dimensions(self.dimensions.unwrap_or(embedding.len()), &embedding)?;
        Ok(embedding)
    }

    /// Embeds several texts in one request, preserving order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.provider.embed_batch(texts, &self.model).await?;
        if embeddings.len() != texts.len() {
            return Err(EmbedderError::CountMismatch {
                expected: texts.len(),
                found: embeddings.len(),
            });
        }
        // Without a configured size the first vector sets it for the batch.
        if let Some(expected) = self.dimensions.or_else(|| embeddings.first().map(Vec::len)) {
            for embedding in &embeddings {
                check_dimensions(expected, embedding)?;
            }
        }

        debug!(model = %self.model, count = texts.len(), "Embedded batch");
        Ok(embeddings)
    }
}

fn check_dimensions(expected: usize, embedding: &[f32]) -> Result<()> {
    if embedding.len() != expected {
        return Err(EmbedderError::DimensionMismatch {
            expected,
            found: embedding.len(),
        });
    }
    Ok(())
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::HashEmbedder;

    #[tokio::test]
    async fn test_vectors_match_configured_dimensions() {
        let embedder = Embedder::new(Arc::new(HashEmbedder::new(8)), "hash", Some(8));
        assert_eq!(embedder.embed("eiffel").await.unwrap().len(), 8);

        let texts = vec!["eiffel".to_string(), "temple".to_string()];
        assert_eq!(embedder.embed_batch(&texts).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_wrong_dimensions_are_rejected() {
        let embedder = Embedder::new(Arc::new(HashEmbedder::new(8)), "hash", Some(16));

        assert!(matches!(
            embedder.embed("eiffel").await,
            Err(EmbedderError::DimensionMismatch { expected: 16, found: 8 })
        ));
        assert!(matches!(
            embedder.embed_batch(&["eiffel".to_string()]).await,
            Err(EmbedderError::DimensionMismatch { expected: 16, found: 8 })
        ));
    }
}
