//! Two-namespace result caching
//!
//! The [`CacheManager`] is the only component that reads or writes the store.
//! It keeps two namespaces in one store:
//! - structured queries, keyed by raw query text
//! - assembled search responses, keyed by the full resolved request
//!
//! The cache is an optimization only: store failures are logged and behave
//! like misses (reads) or no-ops (writes).

mod keys;
mod redis_store;
mod store;

pub use keys::{result_key, structured_key, RESULT_PREFIX, STRUCTURED_PREFIX};
pub use redis_store::RedisCacheStore;
pub use store::{CacheStore, MemoryCacheStore};

use crate::config::{CacheBackend, CacheConfig};
use crate::query::StructuredQuery;
use crate::retrieval::SearchResponse;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),

    #[error("Cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Arbitrates between cached values and recomputation
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    structured_ttl: Duration,
    result_ttl: Duration,
}

impl CacheManager {
    pub fn new(store: Arc<dyn CacheStore>, structured_ttl: Duration, result_ttl: Duration) -> Self {
        Self {
            store,
            structured_ttl,
            result_ttl,
        }
    }

    /// Build the configured store. Only a malformed Redis URL fails here;
    /// an unreachable server degrades at request time.
    pub fn store_from_config(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
        Ok(match config.backend {
            CacheBackend::Redis => Arc::new(RedisCacheStore::new(
                &config.redis_url,
                Duration::from_millis(config.redis_timeout_ms),
            )?),
            CacheBackend::Memory => Arc::new(MemoryCacheStore::new(config.max_entries)),
        })
    }

    pub fn from_config(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self::new(
            store,
            Duration::from_secs(config.structured_ttl_secs),
            Duration::from_secs(config.result_ttl_secs),
        )
    }

    pub async fn get_structured(&self, raw_query: &str) -> Option<StructuredQuery> {
        self.get_json(&structured_key(raw_query)).await
    }

    pub async fn put_structured(&self, raw_query: &str, structured: &StructuredQuery) {
        self.put_json(&structured_key(raw_query), structured, self.structured_ttl)
            .await
    }

    /// Cached response under a key built with [`result_key`]
    pub async fn get_result(&self, key: &str) -> Option<SearchResponse> {
        self.get_json(key).await
    }

    pub async fn put_result(&self, key: &str, response: &SearchResponse) {
        self.put_json(key, response, self.result_ttl).await
    }

    /// Whether the backing store currently answers
    pub async fn is_available(&self) -> bool {
        self.store.ping().await.is_ok()
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Cache read failed for {}, recomputing: {}", key, e);
                return None;
            }
        };

        // Decoding into the typed value restores the exact numeric types
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Skipping cache write for {}: {}", key, CacheError::from(e));
                return;
            }
        };

        if let Err(e) = self.store.set_ex(key, raw, ttl).await {
            tracing::warn!("Cache write failed for {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::AttributeFilter;
    use crate::retrieval::RankedResult;
    use crate::vector_store::PointId;
    use async_trait::async_trait;

    struct DownStore;

    #[async_trait]
    impl CacheStore for DownStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn set_ex(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn ping(&self) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    fn manager(store: Arc<dyn CacheStore>) -> CacheManager {
        CacheManager::new(store, Duration::from_secs(3600), Duration::from_secs(3600))
    }

    fn response() -> SearchResponse {
        SearchResponse {
            results: vec![RankedResult {
                id: PointId::Num(42),
                score: 0.875,
                text: "Title: Dune".to_string(),
            }],
            used_query: "Desert planet epic".to_string(),
            used_filter: AttributeFilter {
                price_max: Some(10.0),
                rating_count_min: Some(500),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_result_round_trip_keeps_types() {
        let cache = manager(Arc::new(MemoryCacheStore::new(10)));
        let key = result_key("dune", 5, Vec::<(&str, serde_json::Value)>::new());

        cache.put_result(&key, &response()).await;
        let cached = cache.get_result(&key).await.unwrap();

        assert_eq!(cached, response());
        assert_eq!(cached.used_filter.rating_count_min, Some(500u64));
        assert_eq!(cached.results[0].id, PointId::Num(42));
    }

    #[tokio::test]
    async fn test_namespaces_are_independent() {
        let cache = manager(Arc::new(MemoryCacheStore::new(10)));
        let structured = StructuredQuery {
            rewritten_query: Some("Desert planet epic".to_string()),
            filter: AttributeFilter::default(),
        };

        cache.put_structured("dune", &structured).await;

        assert_eq!(cache.get_structured("dune").await, Some(structured));
        let key = result_key("dune", 5, Vec::<(&str, serde_json::Value)>::new());
        assert!(cache.get_result(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_degrades_to_miss() {
        let cache = manager(Arc::new(DownStore));

        cache.put_result("k", &response()).await;
        assert!(cache.get_result("k").await.is_none());
        assert!(cache.get_structured("dune").await.is_none());
        assert!(!cache.is_available().await);
    }

    #[tokio::test]
    async fn test_unreachable_redis_degrades_to_miss() {
        let config = CacheConfig {
            redis_url: "redis://127.0.0.1:1".to_string(),
            redis_timeout_ms: 500,
            ..Default::default()
        };
        let store = CacheManager::store_from_config(&config).unwrap();
        let cache = CacheManager::from_config(store, &config);

        cache.put_structured("dune", &StructuredQuery::default()).await;
        assert!(cache.get_structured("dune").await.is_none());
        assert!(!cache.is_available().await);
    }

    #[test]
    fn test_memory_backend_from_config() {
        let config = CacheConfig {
            backend: CacheBackend::Memory,
            redis_url: "unused".to_string(),
            ..Default::default()
        };
        assert!(CacheManager::store_from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let store = Arc::new(MemoryCacheStore::new(10));
        store
            .set_ex("k", "not json".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        let cache = manager(store);
        assert!(cache.get_result("k").await.is_none());
    }
}
