//! Hybrid Retrieval & Reranking
//!
//! This module implements hybrid search combining dense and sparse retrieval,
//! fused with Reciprocal Rank Fusion inside the vector engine, reranked with a
//! cross-encoder, and cached through the [`crate::cache::CacheManager`].

mod fusion;
mod hybrid;
mod reranker;
mod retriever;

pub use fusion::{reciprocal_rank_fusion, FusionConfig, FusionError, DEFAULT_RRF_K};
pub use hybrid::{HybridSearcher, SearchError};
pub use reranker::{render_book, CrossEncoder, FastEmbedCrossEncoder, RerankError, Reranker};
pub use retriever::FusedRetriever;

use crate::config::RetrievalConfig;
use crate::filter::AttributeFilter;
use crate::vector_store::PointId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Search request with optional overrides
///
/// An override of `None` or `Some(0)` means "use the configured default".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Raw query text
    pub query: String,

    /// Number of reranked results to return
    pub top_n: Option<usize>,

    /// Candidates taken from the dense space
    pub dense_top_k: Option<usize>,

    /// Candidates taken from the sparse space
    pub sparse_top_k: Option<usize>,

    /// Candidates kept after fusion (and sent to the reranker)
    pub fusion_top_k: Option<usize>,

    /// Caller-supplied constraints; extracted constraints are merged on top
    #[serde(default)]
    pub filter: AttributeFilter,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
    }

    /// Apply defaults to every absent or zero override
    pub fn resolve(&self, defaults: &RetrievalConfig) -> RetrievalParams {
        fn pick(value: Option<usize>, default: usize) -> usize {
            value.filter(|v| *v > 0).unwrap_or(default)
        }

        RetrievalParams {
            dense_top_k: pick(self.dense_top_k, defaults.dense_top_k),
            sparse_top_k: pick(self.sparse_top_k, defaults.sparse_top_k),
            fusion_top_k: pick(self.fusion_top_k, defaults.fusion_top_k),
            top_n: pick(self.top_n, defaults.top_n),
        }
    }

    /// Resolved keyword parameters that identify this request in the result cache
    pub fn key_params(&self, params: &RetrievalParams) -> Vec<(&'static str, Value)> {
        let mut kwargs = vec![
            ("dense_top_k", Value::from(params.dense_top_k)),
            ("sparse_top_k", Value::from(params.sparse_top_k)),
            ("top_k", Value::from(params.fusion_top_k)),
        ];
        if !self.filter.is_empty() {
            kwargs.push((
                "filter",
                serde_json::to_value(&self.filter).unwrap_or(Value::Null),
            ));
        }
        kwargs
    }
}

/// Fully resolved numeric parameters of one search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalParams {
    pub dense_top_k: usize,
    pub sparse_top_k: usize,
    pub fusion_top_k: usize,
    pub top_n: usize,
}

/// One reranked book: ordering is strictly by descending score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    #[serde(rename = "book_id")]
    pub id: PointId,

    /// Cross-encoder relevance score
    pub score: f32,

    /// Text that was scored
    pub text: String,
}

/// Assembled search response, also the value stored in the result cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<RankedResult>,

    /// Text actually used for retrieval and reranking
    pub used_query: String,

    /// Effective filter after merging extracted constraints
    pub used_filter: AttributeFilter,
}

impl SearchResponse {
    /// Response for a query that was rejected before doing any work
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            used_query: query.into(),
            used_filter: AttributeFilter::default(),
        }
    }
}
