//! Key-value store with per-entry expiry

use super::CacheError;
use async_trait::async_trait;
use moka::sync::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};

/// String-keyed store with set-with-expiry semantics
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, expiring after `ttl`
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Check the store is reachable
    async fn ping(&self) -> Result<(), CacheError>;
}

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process store backed by `moka::sync::Cache`
pub struct MemoryCacheStore {
    cache: Cache<String, Entry>,
}

impl MemoryCacheStore {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    /// Number of live entries (approximate until pending tasks run)
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.cache.get(key).map(|entry| entry.value))
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.cache.insert(key.to_string(), Entry { value, ttl });
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
