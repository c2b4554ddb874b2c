//! Vector engine access
//!
//! The engine holds one collection with a dense and a sparse named vector per
//! book. A [`FusedQuery`] asks it for two filtered top-k lists fused with RRF.

mod memory;
mod qdrant;

pub use memory::{MemoryVectorStore, StoredPoint};
pub use qdrant::QdrantStore;

use crate::embedding::SparseVector;
use crate::filter::Predicate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Vector engine request failed: {0}")]
    RequestError(String),

    #[error("Malformed vector engine response: {0}")]
    MalformedResponse(String),

    #[error("Collection not found: {0}")]
    CollectionMissing(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Point identifier: the engine accepts unsigned integers or UUID strings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{}", n),
            PointId::Uuid(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for PointId {
    fn from(value: u64) -> Self {
        PointId::Num(value)
    }
}

/// Stored attributes of a book point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookPayload {
    pub title: String,
    pub description_summary: String,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub rating_count: Option<u64>,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
}

/// One fused hit: ordering is by descending fused score
#[derive(Debug, Clone, PartialEq)]
pub struct FusionCandidate {
    pub id: PointId,
    pub score: f32,
    pub payload: BookPayload,
}

/// Dual-space nearest-neighbour query fused with reciprocal rank fusion
#[derive(Debug, Clone)]
pub struct FusedQuery {
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
    pub dense_limit: usize,
    pub sparse_limit: usize,
    pub limit: usize,
    /// `None` searches the whole collection
    pub filter: Option<Predicate>,
}

/// Vector engine supporting per-space top-k, RRF fusion and payload filtering
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Run both sub-queries under the same filter and return the fused list
    async fn query_fused(&self, query: &FusedQuery)
        -> Result<Vec<FusionCandidate>, VectorStoreError>;

    /// Name of the backing collection
    fn collection(&self) -> &str;
}
