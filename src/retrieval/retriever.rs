//! Dual-signal retrieval fused by the vector engine

use crate::embedding::HybridEmbedder;
use crate::filter::{build_predicate, AttributeFilter};
use crate::retrieval::{RetrievalParams, SearchError};
use crate::vector_store::{FusedQuery, FusionCandidate, VectorStore};
use std::sync::Arc;

/// Embeds the query once and issues the fused dense + sparse lookup
#[derive(Clone)]
pub struct FusedRetriever {
    embedder: HybridEmbedder,
    store: Arc<dyn VectorStore>,
}

impl FusedRetriever {
    pub fn new(embedder: HybridEmbedder, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Retrieve up to `fusion_top_k` candidates for `query_text` under `filter`.
    ///
    /// Zero hits in both spaces is an empty list, not an error.
    pub async fn retrieve(
        &self,
        query_text: &str,
        filter: &AttributeFilter,
        params: &RetrievalParams,
    ) -> Result<Vec<FusionCandidate>, SearchError> {
        let embedding = self.embedder.embed(query_text).await?;
        let predicate = build_predicate(filter);

        if let Some(predicate) = &predicate {
            tracing::debug!(conditions = predicate.must.len(), "filtering retrieval");
        }

        let query = FusedQuery {
            dense: embedding.dense,
            sparse: embedding.sparse,
            dense_limit: params.dense_top_k,
            sparse_limit: params.sparse_top_k,
            limit: params.fusion_top_k,
            filter: predicate,
        };

        let mut candidates = self.store.query_fused(&query).await?;
        candidates.truncate(params.fusion_top_k);

        tracing::debug!(
            collection = self.store.collection(),
            hits = candidates.len(),
            "fused retrieval complete"
        );

        Ok(candidates)
    }
}
