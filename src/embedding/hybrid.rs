//! Dense + sparse embedding of one query text

use super::{DenseEmbedder, EmbeddingError, SparseEmbedder, SparseVector};
use std::sync::Arc;

/// Both representations of the same text
#[derive(Debug, Clone)]
pub struct HybridEmbedding {
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
}

/// Produces a dense and a sparse vector for a query string
#[derive(Clone)]
pub struct HybridEmbedder {
    dense: Arc<dyn DenseEmbedder>,
    sparse: Arc<dyn SparseEmbedder>,
}

impl HybridEmbedder {
    pub fn new(dense: Arc<dyn DenseEmbedder>, sparse: Arc<dyn SparseEmbedder>) -> Self {
        Self { dense, sparse }
    }

    /// Embed `text` in both spaces.
    ///
    /// The two embeddings are independent and run concurrently. There is no
    /// partial result: if either fails, the whole call fails.
    pub async fn embed(&self, text: &str) -> Result<HybridEmbedding, EmbeddingError> {
        let sparse_model = Arc::clone(&self.sparse);
        let owned = text.to_string();

        let (dense, sparse) = tokio::join!(
            self.dense.embed(text),
            tokio::task::spawn_blocking(move || sparse_model.embed(&owned))
        );

        let dense = dense?;
        let sparse = sparse.map_err(|e| {
            EmbeddingError::GenerationError(format!("sparse embedding task failed: {}", e))
        })??;

        Ok(HybridEmbedding { dense, sparse })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedDense(Option<Vec<f32>>);

    #[async_trait]
    impl DenseEmbedder for FixedDense {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.0
                .clone()
                .ok_or_else(|| EmbeddingError::RequestError("timeout".to_string()))
        }

        fn model_name(&self) -> &str {
            "fixed-dense"
        }
    }

    struct FixedSparse(bool);

    impl SparseEmbedder for FixedSparse {
        fn embed(&self, _text: &str) -> Result<SparseVector, EmbeddingError> {
            if self.0 {
                Ok(SparseVector::new(vec![3], vec![1.0]))
            } else {
                Err(EmbeddingError::GenerationError("boom".to_string()))
            }
        }

        fn model_name(&self) -> &str {
            "fixed-sparse"
        }
    }

    #[tokio::test]
    async fn test_both_vectors() {
        let embedder = HybridEmbedder::new(
            Arc::new(FixedDense(Some(vec![0.1, 0.2]))),
            Arc::new(FixedSparse(true)),
        );
        let embedding = embedder.embed("dune").await.unwrap();

        assert_eq!(embedding.dense, vec![0.1, 0.2]);
        assert_eq!(embedding.sparse.indices, vec![3]);
    }

    #[tokio::test]
    async fn test_dense_failure_fails_whole_call() {
        let embedder =
            HybridEmbedder::new(Arc::new(FixedDense(None)), Arc::new(FixedSparse(true)));
        assert!(matches!(
            embedder.embed("dune").await,
            Err(EmbeddingError::RequestError(_))
        ));
    }

    #[tokio::test]
    async fn test_sparse_failure_fails_whole_call() {
        let embedder = HybridEmbedder::new(
            Arc::new(FixedDense(Some(vec![1.0]))),
            Arc::new(FixedSparse(false)),
        );
        assert!(embedder.embed("dune").await.is_err());
    }
}
