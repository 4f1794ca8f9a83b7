//! Storefront cache: namespaced keys that are invalidated by bumping a version counter.

use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// Atomically increments an integer key, creating it at 1.
    async fn incr(&self, key: &str) -> Result<i64, CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| Instant::now() > expires_at)
            .unwrap_or(false)
    }
}

/// Process-local cache, used in development and tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        {
            let store = self.store.read().await;
            match store.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                None => return Ok(None),
                Some(_) => {}
            }
        }
        self.store.write().await.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.store
            .write()
            .await
            .insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.store.write().await.remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        let mut store = self.store.write().await;
        let current = match store.get(key) {
            Some(entry) if !entry.is_expired() => entry.value.parse::<i64>().map_err(|_| {
                CacheError::OperationFailed(format!("value at {} is not an integer", key))
            })?,
            _ => 0,
        };
        let next = current + 1;
        store.insert(key.to_string(), CacheEntry::new(next.to_string(), None));
        Ok(next)
    }
}

/// Redis-backed cache shared by every instance of the service
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.client.get_async_connection().await?;
        let result: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.client.get_async_connection().await?;
        if let Some(ttl) = ttl {
            redis::cmd("SETEX")
                .arg(key)
                .arg(ttl.as_secs())
                .arg(value)
                .query_async::<_, ()>(&mut conn)
                .await?;
        } else {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .query_async::<_, ()>(&mut conn)
                .await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.client.get_async_connection().await?;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        let mut conn = self.client.get_async_connection().await?;
        let value: i64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }
}

/// Namespaced view over a cache backend.
///
/// Keys are written as `{prefix}:{namespace}:v{version}:{key}`. Flushing a
/// namespace bumps its version so every older key becomes unreachable and
/// expires on its own.
#[derive(Clone)]
pub struct StorefrontCache {
    backend: Arc<dyn CacheBackend>,
    prefix: String,
    ttl: Duration,
}

impl StorefrontCache {
    pub fn new(backend: Arc<dyn CacheBackend>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            ttl: Duration::from_secs(300),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryCache::new()), "storefront")
    }

    /// Builds the configured backend, falling back to in-memory when Redis is unusable.
    pub fn from_config(config: &AppConfig) -> Self {
        if config.uses_redis_cache() {
            match config.redis_url.as_deref().map(RedisCache::new) {
                Some(Ok(redis)) => return Self::new(Arc::new(redis), config.cache_namespace.clone()),
                Some(Err(e)) => warn!("Failed to open Redis client, using in-memory cache: {}", e),
                None => warn!("cache_backend is redis but no redis_url is set; using in-memory cache"),
            }
        }
        Self::new(Arc::new(InMemoryCache::new()), config.cache_namespace.clone())
    }

    fn version_key(&self, namespace: &str) -> String {
        format!("{}:{}:version", self.prefix, namespace)
    }

    async fn namespace_version(&self, namespace: &str) -> Result<i64, CacheError> {
        let raw = self.backend.get(&self.version_key(namespace)).await?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    async fn key(&self, namespace: &str, key: &str) -> Result<String, CacheError> {
        let version = self.namespace_version(namespace).await?;
        Ok(format!("{}:{}:v{}:{}", self.prefix, namespace, version, key))
    }

    /// Reads a JSON value; any cache failure is treated as a miss.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        namespace: &str,
        key: &str,
    ) -> Option<T> {
        let result = async {
            let full_key = self.key(namespace, key).await?;
            match self.backend.get(&full_key).await? {
                Some(raw) => Ok::<_, CacheError>(Some(serde_json::from_str(&raw)?)),
                None => Ok(None),
            }
        }
        .await;

        match result {
            Ok(Some(value)) => {
                counter!("storefront_cache.hit", 1);
                Some(value)
            }
            Ok(None) => {
                counter!("storefront_cache.miss", 1);
                None
            }
            Err(e) => {
                warn!(namespace, key, "cache read failed: {}", e);
                None
            }
        }
    }

    /// Writes a JSON value; failures are logged.
    pub async fn put_json<T: serde::Serialize>(&self, namespace: &str, key: &str, value: &T) {
        let result = async {
            let full_key = self.key(namespace, key).await?;
            let raw = serde_json::to_string(value)?;
            self.backend.set(&full_key, &raw, Some(self.ttl)).await
        }
        .await;

        if let Err(e) = result {
            warn!(namespace, key, "cache write failed: {}", e);
        }
    }

    /// Invalidates every key of a namespace. Never fails the caller.
    pub async fn flush_namespace(&self, namespace: &str) {
        match self.backend.incr(&self.version_key(namespace)).await {
            Ok(version) => {
                counter!("storefront_cache.flush", 1);
                debug!(namespace, version, "cache namespace flushed");
            }
            Err(e) => warn!(namespace, "cache flush failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenBackend;

    #[async_trait::async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::OperationFailed("down".into()))
        }
        async fn set(&self, _: &str, _: &str, _: Option<Duration>) -> Result<(), CacheError> {
            Err(CacheError::OperationFailed("down".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::OperationFailed("down".into()))
        }
        async fn incr(&self, _key: &str) -> Result<i64, CacheError> {
            Err(CacheError::OperationFailed("down".into()))
        }
    }

    #[tokio::test]
    async fn flush_hides_previously_cached_values() {
        let cache = StorefrontCache::in_memory();
        cache.put_json("product", "7", &"tee").await;
        assert_eq!(cache.get_json::<String>("product", "7").await.as_deref(), Some("tee"));

        cache.flush_namespace("product").await;
        assert_eq!(cache.get_json::<String>("product", "7").await, None);
    }

    #[tokio::test]
    async fn flush_leaves_other_namespaces() {
        let cache = StorefrontCache::in_memory();
        cache.put_json("category", "1", &1).await;
        cache.flush_namespace("product").await;
        assert_eq!(cache.get_json::<i32>("category", "1").await, Some(1));
    }

    #[tokio::test]
    async fn failing_backend_is_a_miss_not_an_error() {
        let cache = StorefrontCache::new(Arc::new(BrokenBackend), "t");
        cache.put_json("product", "1", &1).await;
        cache.flush_namespace("product").await;
        assert_eq!(cache.get_json::<i32>("product", "1").await, None);
    }

    #[tokio::test]
    async fn in_memory_incr_counts_up() {
        let backend = InMemoryCache::new();
        assert_eq!(backend.incr("k").await.unwrap(), 1);
        assert_eq!(backend.incr("k").await.unwrap(), 2);
    }
}
