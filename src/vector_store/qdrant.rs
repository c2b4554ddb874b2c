// Qdrant REST client for fused dense/sparse queries

use super::{BookPayload, FusedQuery, FusionCandidate, PointId, VectorStore, VectorStoreError};
use crate::config::VectorStoreConfig;
use crate::embedding::SparseVector;
use crate::filter::Predicate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct QueryRequest<'a> {
    prefetch: [Prefetch<'a>; 2],
    query: FusionSpec,
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Predicate>,
    with_payload: bool,
}

#[derive(Serialize)]
struct Prefetch<'a> {
    query: PrefetchQuery<'a>,
    using: &'a str,
    limit: usize,
}

#[derive(Serialize)]
#[serde(untagged)]
enum PrefetchQuery<'a> {
    Dense(&'a [f32]),
    Sparse(&'a SparseVector),
}

#[derive(Serialize)]
struct FusionSpec {
    fusion: &'static str,
}

#[derive(Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Deserialize)]
struct QueryResult {
    points: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: PointId,
    score: f32,
    #[serde(default)]
    payload: Option<BookPayload>,
}

#[derive(Deserialize)]
struct ExistsResponse {
    result: ExistsResult,
}

#[derive(Deserialize)]
struct ExistsResult {
    exists: bool,
}

/// Vector store backed by a Qdrant collection with named `dense` / `sparse` vectors
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    dense_vector: String,
    sparse_vector: String,
    api_key: Option<String>,
}

impl QdrantStore {
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        dense_vector: impl Into<String>,
        sparse_vector: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, VectorStoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VectorStoreError::RequestError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            dense_vector: dense_vector.into(),
            sparse_vector: sparse_vector.into(),
            api_key,
        })
    }

    pub fn from_config(config: &VectorStoreConfig) -> Result<Self, VectorStoreError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());

        Self::new(
            &config.url,
            &config.collection,
            &config.dense_vector,
            &config.sparse_vector,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Fail unless the collection exists. The service never creates it.
    pub async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        let url = format!("{}/collections/{}/exists", self.base_url, self.collection);
        let response = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(|e| VectorStoreError::RequestError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VectorStoreError::RequestError(format!(
                "collection check returned {}",
                response.status()
            )));
        }

        let body: ExistsResponse = response
            .json()
            .await
            .map_err(|e| VectorStoreError::MalformedResponse(e.to_string()))?;

        if body.result.exists {
            tracing::info!("Using collection '{}'", self.collection);
            Ok(())
        } else {
            Err(VectorStoreError::CollectionMissing(self.collection.clone()))
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    fn build_request<'a>(&'a self, query: &'a FusedQuery) -> QueryRequest<'a> {
        QueryRequest {
            prefetch: [
                Prefetch {
                    query: PrefetchQuery::Sparse(&query.sparse),
                    using: &self.sparse_vector,
                    limit: query.sparse_limit,
                },
                Prefetch {
                    query: PrefetchQuery::Dense(&query.dense),
                    using: &self.dense_vector,
                    limit: query.dense_limit,
                },
            ],
            query: FusionSpec { fusion: "rrf" },
            limit: query.limit,
            filter: query.filter.as_ref(),
            with_payload: true,
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn query_fused(
        &self,
        query: &FusedQuery,
    ) -> Result<Vec<FusionCandidate>, VectorStoreError> {
        if query.dense.is_empty() {
            return Err(VectorStoreError::InvalidQuery(
                "dense query vector is empty".to_string(),
            ));
        }

        let url = format!(
            "{}/collections/{}/points/query",
            self.base_url, self.collection
        );
        let response = self
            .request(self.client.post(&url))
            .json(&self.build_request(query))
            .send()
            .await
            .map_err(|e| VectorStoreError::RequestError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::RequestError(format!(
                "query returned {}: {}",
                status, body
            )));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| VectorStoreError::MalformedResponse(e.to_string()))?;

        Ok(body
            .result
            .points
            .into_iter()
            .map(|p| FusionCandidate {
                id: p.id,
                score: p.score,
                payload: p.payload.unwrap_or_default(),
            })
            .collect())
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}
