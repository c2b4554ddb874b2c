//! Query embedding
//!
//! Architecture:
//! - DenseEmbedder trait for the remote dense embedding service (JinaDenseEmbedder)
//! - SparseEmbedder trait for the in-process sparse model (FastEmbedSparseEmbedder)
//! - HybridEmbedder computes both for one text; either failure fails the whole call

mod dense;
mod hybrid;
mod sparse;

pub use dense::JinaDenseEmbedder;
pub use hybrid::{HybridEmbedder, HybridEmbedding};
pub use sparse::FastEmbedSparseEmbedder;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Embedding service request failed: {0}")]
    RequestError(String),

    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("Missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Sparse vector as index/value pairs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn new(indices: Vec<u32>, values: Vec<f32>) -> Self {
        Self { indices, values }
    }

    /// Dot product against another sparse vector
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let mut weights = ahash::AHashMap::with_capacity(self.indices.len());
        for (index, value) in self.indices.iter().zip(&self.values) {
            weights.insert(*index, *value);
        }
        other
            .indices
            .iter()
            .zip(&other.values)
            .filter_map(|(index, value)| weights.get(index).map(|w| w * value))
            .sum()
    }
}

/// Remote dense embedding service
#[async_trait]
pub trait DenseEmbedder: Send + Sync {
    /// Embed a single text into a fixed-length vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// In-process sparse embedding model
///
/// Implementations are CPU-bound and are called from the blocking pool.
pub trait SparseEmbedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<SparseVector, EmbeddingError>;

    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_dot() {
        let a = SparseVector::new(vec![1, 5, 9], vec![0.5, 1.0, 2.0]);
        let b = SparseVector::new(vec![5, 9, 42], vec![2.0, 0.25, 3.0]);
        assert!((a.dot(&b) - 2.5).abs() < 1e-6);
        assert_eq!(a.dot(&SparseVector::default()), 0.0);
    }
}
