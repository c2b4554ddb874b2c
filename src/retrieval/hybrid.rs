//! Hybrid search orchestration: extraction, fused retrieval, reranking and caching

use crate::cache::{result_key, CacheManager};
use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingError;
use crate::error::ErrorCode;
use crate::filter::AttributeFilter;
use crate::query::{ExtractionError, FilterExtractor, StructuredQuery};
use crate::retrieval::{
    FusedRetriever, RankedResult, RerankError, Reranker, RetrievalParams, SearchRequest,
    SearchResponse,
};
use crate::vector_store::VectorStoreError;
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector search failed: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("Reranking failed: {0}")]
    Reranking(#[from] RerankError),

    #[error("Query extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
}

impl SearchError {
    /// Code reported at the RPC boundary. Every pipeline failure comes from
    /// a collaborator, so all of them are `UNAVAILABLE`.
    pub fn code(&self) -> ErrorCode {
        match self {
            SearchError::Embedding(_)
            | SearchError::VectorStore(_)
            | SearchError::Reranking(_)
            | SearchError::Extraction(_) => ErrorCode::Unavailable,
        }
    }
}

/// Orchestrates one search end to end.
///
/// Holds no mutable state of its own; everything shared lives in the cache
/// store and the vector engine, so one instance serves all workers.
#[derive(Clone)]
pub struct HybridSearcher {
    extractor: Arc<dyn FilterExtractor>,
    retriever: FusedRetriever,
    reranker: Reranker,
    cache: CacheManager,
    config: RetrievalConfig,
}

impl HybridSearcher {
    pub fn new(
        extractor: Arc<dyn FilterExtractor>,
        retriever: FusedRetriever,
        reranker: Reranker,
        cache: CacheManager,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            extractor,
            retriever,
            reranker,
            cache,
            config,
        }
    }

    /// Full pipeline: result cache, structured extraction, fused retrieval,
    /// rerank, then cache the assembled response.
    ///
    /// An empty (or whitespace-only) query returns an empty response without
    /// touching the cache or any collaborator.
    pub async fn search_with_filter(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResponse, SearchError> {
        if request.query.trim().is_empty() {
            return Ok(SearchResponse::empty(request.query.clone()));
        }

        let span = tracing::info_span!("search", query = %request.query);
        self.search_with_filter_inner(request).instrument(span).await
    }

    async fn search_with_filter_inner(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResponse, SearchError> {
        let params = request.resolve(&self.config);
        let key = result_key(&request.query, params.top_n, request.key_params(&params));

        if let Some(cached) = self.cache.get_result(&key).await {
            tracing::info!("Result cache hit");
            return Ok(cached);
        }
        tracing::info!("Result cache miss");

        let structured = self.structured_query(&request.query).await?;

        let mut filter = request.filter.clone().pruned();
        filter.merge_from(&structured.filter);
        let query_text = structured
            .rewritten_query
            .unwrap_or_else(|| request.query.clone());

        tracing::debug!(used_query = %query_text, ?filter, "resolved query");

        let results = self.run_pipeline(&query_text, &filter, &params).await?;

        let response = SearchResponse {
            results,
            used_query: query_text,
            used_filter: filter,
        };
        self.cache.put_result(&key, &response).await;

        Ok(response)
    }

    /// Retrieval and rerank with the caller's filter and raw text only.
    ///
    /// No extraction and no caching are involved.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        if request.query.trim().is_empty() {
            return Ok(SearchResponse::empty(request.query.clone()));
        }

        let params = request.resolve(&self.config);
        let filter = request.filter.clone().pruned();
        let results = self
            .run_pipeline(&request.query, &filter, &params)
            .await?;

        Ok(SearchResponse {
            results,
            used_query: request.query.clone(),
            used_filter: filter,
        })
    }

    async fn structured_query(&self, raw_query: &str) -> Result<StructuredQuery, SearchError> {
        if let Some(cached) = self.cache.get_structured(raw_query).await {
            tracing::info!("Structured query cache hit");
            return Ok(cached);
        }
        tracing::info!("Structured query cache miss");

        let structured = self.extractor.extract(raw_query).await?;
        self.cache.put_structured(raw_query, &structured).await;
        Ok(structured)
    }

    async fn run_pipeline(
        &self,
        query_text: &str,
        filter: &AttributeFilter,
        params: &RetrievalParams,
    ) -> Result<Vec<RankedResult>, SearchError> {
        let candidates = self.retriever.retrieve(query_text, filter, params).await?;
        if candidates.is_empty() {
            tracing::info!("No candidates matched");
            return Ok(Vec::new());
        }

        let ranked = self
            .reranker
            .rerank(query_text, &candidates, params.top_n)
            .await?;

        tracing::info!(
            candidates = candidates.len(),
            returned = ranked.len(),
            "search complete"
        );
        Ok(ranked)
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn reranker_model(&self) -> &str {
        self.reranker.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let upstream = SearchError::Embedding(EmbeddingError::RequestError("timeout".into()));
        assert_eq!(upstream.code(), ErrorCode::Unavailable);

        let malformed =
            SearchError::Extraction(ExtractionError::MalformedResponse("not json".into()));
        assert_eq!(malformed.code(), ErrorCode::Unavailable);
    }
}
