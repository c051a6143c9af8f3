//! Registry of known embedding models.
//!
//! A closed enumeration with one open variant (`Custom`) whose width is
//! supplied by the caller at configuration time. All stored embeddings under
//! one dimension instance share a single model.

use crate::error::{MeaningError, Result};
use serde::{Deserialize, Serialize};

/// Origin of an embedding model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    OpenAi,
    HuggingFace,
    Local,
    Custom,
}

/// Known embedding models with their dimensionality and token limits.
///
/// `Custom` has no intrinsic width; [`EmbeddingModel::dimensions`] returns 0
/// for it and configuration must supply `custom_dimensions` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddingModel {
    #[serde(rename = "text-embedding-3-small")]
    TextEmbedding3Small,
    #[serde(rename = "text-embedding-3-large")]
    TextEmbedding3Large,
    #[serde(rename = "text-embedding-ada-002")]
    TextEmbeddingAda002,
    #[serde(rename = "all-MiniLM-L6-v2")]
    AllMiniLmL6V2,
    #[serde(rename = "all-mpnet-base-v2")]
    AllMpnetBaseV2,
    #[serde(rename = "bge-small-en-v1.5")]
    BgeSmallEnV15,
    #[serde(rename = "bge-base-en-v1.5")]
    BgeBaseEnV15,
    #[serde(rename = "bge-large-en-v1.5")]
    BgeLargeEnV15,
    #[serde(rename = "nomic-embed-text")]
    NomicEmbedText,
    #[serde(rename = "nomic-embed-text-v1.5")]
    NomicEmbedTextV15,
    #[serde(rename = "custom")]
    Custom,
}

impl EmbeddingModel {
    /// Every model in the registry, in declaration order.
    pub const ALL: [EmbeddingModel; 11] = [
        EmbeddingModel::TextEmbedding3Small,
        EmbeddingModel::TextEmbedding3Large,
        EmbeddingModel::TextEmbeddingAda002,
        EmbeddingModel::AllMiniLmL6V2,
        EmbeddingModel::AllMpnetBaseV2,
        EmbeddingModel::BgeSmallEnV15,
        EmbeddingModel::BgeBaseEnV15,
        EmbeddingModel::BgeLargeEnV15,
        EmbeddingModel::NomicEmbedText,
        EmbeddingModel::NomicEmbedTextV15,
        EmbeddingModel::Custom,
    ];

    /// Canonical model name.
    pub fn name(&self) -> &'static str {
        match self {
            EmbeddingModel::TextEmbedding3Small => "text-embedding-3-small",
            EmbeddingModel::TextEmbedding3Large => "text-embedding-3-large",
            EmbeddingModel::TextEmbeddingAda002 => "text-embedding-ada-002",
            EmbeddingModel::AllMiniLmL6V2 => "all-MiniLM-L6-v2",
            EmbeddingModel::AllMpnetBaseV2 => "all-mpnet-base-v2",
            EmbeddingModel::BgeSmallEnV15 => "bge-small-en-v1.5",
            EmbeddingModel::BgeBaseEnV15 => "bge-base-en-v1.5",
            EmbeddingModel::BgeLargeEnV15 => "bge-large-en-v1.5",
            EmbeddingModel::NomicEmbedText => "nomic-embed-text",
            EmbeddingModel::NomicEmbedTextV15 => "nomic-embed-text-v1.5",
            EmbeddingModel::Custom => "custom",
        }
    }

    /// Embedding width produced by this model. 0 for `Custom`.
    pub fn dimensions(&self) -> usize {
        match self {
            EmbeddingModel::TextEmbedding3Small => 1536,
            EmbeddingModel::TextEmbedding3Large => 3072,
            EmbeddingModel::TextEmbeddingAda002 => 1536,
            EmbeddingModel::AllMiniLmL6V2 => 384,
            EmbeddingModel::AllMpnetBaseV2 => 768,
            EmbeddingModel::BgeSmallEnV15 => 384,
            EmbeddingModel::BgeBaseEnV15 => 768,
            EmbeddingModel::BgeLargeEnV15 => 1024,
            EmbeddingModel::NomicEmbedText => 768,
            EmbeddingModel::NomicEmbedTextV15 => 768,
            EmbeddingModel::Custom => 0,
        }
    }

    /// Maximum input tokens accepted by this model. 0 for `Custom`.
    pub fn max_tokens(&self) -> usize {
        match self {
            EmbeddingModel::TextEmbedding3Small
            | EmbeddingModel::TextEmbedding3Large
            | EmbeddingModel::TextEmbeddingAda002 => 8191,
            EmbeddingModel::AllMiniLmL6V2
            | EmbeddingModel::AllMpnetBaseV2
            | EmbeddingModel::BgeSmallEnV15
            | EmbeddingModel::BgeBaseEnV15
            | EmbeddingModel::BgeLargeEnV15 => 512,
            EmbeddingModel::NomicEmbedText => 8192,
            EmbeddingModel::NomicEmbedTextV15 => 8192,
            EmbeddingModel::Custom => 0,
        }
    }

    /// Provider that serves this model.
    pub fn provider(&self) -> ModelProvider {
        match self {
            EmbeddingModel::TextEmbedding3Small
            | EmbeddingModel::TextEmbedding3Large
            | EmbeddingModel::TextEmbeddingAda002 => ModelProvider::OpenAi,
            EmbeddingModel::AllMiniLmL6V2
            | EmbeddingModel::AllMpnetBaseV2
            | EmbeddingModel::BgeSmallEnV15
            | EmbeddingModel::BgeBaseEnV15
            | EmbeddingModel::BgeLargeEnV15
            | EmbeddingModel::NomicEmbedTextV15 => ModelProvider::HuggingFace,
            EmbeddingModel::NomicEmbedText => ModelProvider::Local,
            EmbeddingModel::Custom => ModelProvider::Custom,
        }
    }
}

impl std::fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fails with `ModelMismatch` unless the two models are identical.
pub fn validate_model_compatibility(expected: EmbeddingModel, actual: EmbeddingModel) -> Result<()> {
    if expected != actual {
        return Err(MeaningError::ModelMismatch {
            expected: expected.name().to_string(),
            actual: actual.name().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_widths() {
        assert_eq!(EmbeddingModel::TextEmbedding3Small.dimensions(), 1536);
        assert_eq!(EmbeddingModel::TextEmbedding3Large.dimensions(), 3072);
        assert_eq!(EmbeddingModel::AllMiniLmL6V2.dimensions(), 384);
        assert_eq!(EmbeddingModel::BgeLargeEnV15.dimensions(), 1024);
        assert_eq!(EmbeddingModel::NomicEmbedTextV15.dimensions(), 768);
        assert_eq!(EmbeddingModel::Custom.dimensions(), 0);
    }

    #[test]
    fn test_registry_providers() {
        assert_eq!(EmbeddingModel::TextEmbeddingAda002.provider(), ModelProvider::OpenAi);
        assert_eq!(EmbeddingModel::BgeBaseEnV15.provider(), ModelProvider::HuggingFace);
        assert_eq!(EmbeddingModel::NomicEmbedText.provider(), ModelProvider::Local);
        assert_eq!(EmbeddingModel::Custom.provider(), ModelProvider::Custom);
    }

    #[test]
    fn test_serde_round_trip_by_name() {
        for model in EmbeddingModel::ALL {
            let json = serde_json::to_string(&model).unwrap();
            assert_eq!(json, format!("\"{}\"", model.name()));
            let back: EmbeddingModel = serde_json::from_str(&json).unwrap();
            assert_eq!(back, model);
        }
    }

    #[test]
    fn test_compatibility() {
        assert!(validate_model_compatibility(
            EmbeddingModel::AllMiniLmL6V2,
            EmbeddingModel::AllMiniLmL6V2
        )
        .is_ok());
        let err = validate_model_compatibility(
            EmbeddingModel::AllMiniLmL6V2,
            EmbeddingModel::BgeBaseEnV15,
        )
        .unwrap_err();
        assert!(matches!(err, MeaningError::ModelMismatch { .. }));
    }
}
