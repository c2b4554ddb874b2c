//! Redis-backed store shared by every server process

use super::{CacheError, CacheStore};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use std::future::Future;
use std::time::Duration;
use tokio::sync::OnceCell;

/// `GET` / `SET .. EX` against a Redis instance.
///
/// The connection is opened on first use, so a server can start while Redis
/// is down; every call made before it comes back fails with
/// [`CacheError::Unavailable`].
pub struct RedisCacheStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    timeout: Duration,
}

impl RedisCacheStore {
    /// Parse `url` without connecting
    pub fn new(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(unavailable)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            timeout,
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                bounded(self.timeout, self.client.get_connection_manager()).await
            })
            .await?;
        Ok(manager.clone())
    }
}

fn unavailable(e: RedisError) -> CacheError {
    CacheError::Unavailable(e.to_string())
}

async fn bounded<T, F>(timeout: Duration, op: F) -> Result<T, CacheError>
where
    F: Future<Output = Result<T, RedisError>>,
{
    match tokio::time::timeout(timeout, op).await {
        Ok(result) => result.map_err(unavailable),
        Err(_) => Err(CacheError::Unavailable(format!(
            "timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        let value = bounded(
            self.timeout,
            cmd.query_async::<_, Option<String>>(&mut conn),
        )
        .await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        // EX takes whole seconds and rejects zero
        let seconds = ttl.as_secs().max(1);
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("EX").arg(seconds);
        bounded(self.timeout, cmd.query_async::<_, ()>(&mut conn)).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let cmd = redis::cmd("PING");
        bounded(self.timeout, cmd.query_async::<_, String>(&mut conn)).await?;
        Ok(())
    }
}
