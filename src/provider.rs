//! Embedding provider capability.
//!
//! The provider is an optional collaborator supplied through configuration;
//! text-path operations fail closed when it is absent. Implementations wrap
//! whatever backend produces the vectors (an API client, a local model); this
//! crate never constructs embeddings itself.

use crate::model::EmbeddingModel;
use thiserror::Error;

/// Failure reported by an embedding provider backend.
#[derive(Debug, Error)]
#[error("embedding provider error: {0}")]
pub struct ProviderError(pub String);

/// A source of embedding vectors for raw text.
///
/// The provider's [`model`](EmbeddingProvider::model) must match the model
/// the dimension instance was configured with; the mismatch is rejected at
/// construction time.
pub trait EmbeddingProvider: Send + Sync {
    /// Model this provider embeds with.
    fn model(&self) -> EmbeddingModel;

    /// Embed a single text into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embed a batch of texts. The default implementation embeds one by one.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider;

    impl EmbeddingProvider for FixedProvider {
        fn model(&self) -> EmbeddingModel {
            EmbeddingModel::Custom
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    #[test]
    fn test_default_embed_batch() {
        let p = FixedProvider;
        let out = p
            .embed_batch(&["a".to_string(), "abc".to_string()])
            .unwrap();
        assert_eq!(out, vec![vec![1.0, 1.0], vec![3.0, 1.0]]);
    }
}
