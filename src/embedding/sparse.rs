//! Sparse (SPLADE) embeddings computed locally with FastEmbed

use super::{EmbeddingError, SparseEmbedder, SparseVector};
use fastembed::{SparseInitOptions, SparseModel, SparseTextEmbedding};
use std::sync::Arc;

/// FastEmbed provider for local sparse embedding generation
///
/// **Important**: Models are downloaded on-demand to the FastEmbed cache
/// directory on first use. SPLADE++ is ~530MB.
pub struct FastEmbedSparseEmbedder {
    model: Arc<SparseTextEmbedding>,
    model_name: String,
}

impl FastEmbedSparseEmbedder {
    /// Create a new sparse embedder with the specified model
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let sparse_model = match model_name {
            "prithivida/Splade_PP_en_v1" | "splade-pp-en-v1" => SparseModel::SPLADEPPV1,
            _ => {
                return Err(EmbeddingError::InitializationError(format!(
                    "Unsupported sparse model: {}. Supported: prithivida/Splade_PP_en_v1",
                    model_name
                )));
            }
        };

        tracing::info!("Initializing sparse embedding model: {}", model_name);

        let init_options = SparseInitOptions::new(sparse_model).with_show_download_progress(true);

        let model = SparseTextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
        })
    }

    /// Create embedder with default model (SPLADE++ English v1)
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new("prithivida/Splade_PP_en_v1")
    }
}

impl SparseEmbedder for FastEmbedSparseEmbedder {
    fn embed(&self, text: &str) -> Result<SparseVector, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let embedding = self
            .model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::GenerationError("No embeddings generated".to_string()))?;

        let indices = embedding.indices.into_iter().map(|i| i as u32).collect();
        Ok(SparseVector::new(indices, embedding.values))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
