//! Read-through cache for listing and detail reads.
//!
//! Lookups that fail at the transport level count as misses, population after
//! a miss runs as a detached task, and every catalog write flushes the whole
//! cache through [`ReadThrough::invalidate_all`].

pub mod keys;
mod redis_cache;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use log::{debug, error, warn};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;

pub use redis_cache::RedisCache;

/// Key-value store holding serialized read results.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Value stored under `key`, or `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value under `key` with one that expires after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Drop every key.
    async fn flush(&self) -> Result<()>;
}

/// Cache-aside policy wrapped around a [`Cache`] capability.
#[derive(Clone)]
pub struct ReadThrough {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl ReadThrough {
    #[must_use]
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Cached value under `key`. Transport and decoding failures are logged
    /// and reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.cache.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Cache miss for {}", key);
                return None;
            }
            Err(e) => {
                warn!("Cache lookup for {} failed, reading through: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("Cache hit for {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Store `value` under `key` in the background. The caller never waits
    /// and failures only reach the log.
    pub fn populate<T: Serialize>(&self, key: String, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                error!("Could not serialize cache entry {}: {}", key, e);
                return;
            }
        };

        let cache = Arc::clone(&self.cache);
        let ttl = self.ttl;
        tokio::spawn(async move {
            if let Err(e) = cache.set(&key, raw, ttl).await {
                error!("Failed to cache {}: {}", key, e);
            }
        });
    }

    /// Serve `key` from the cache, or run `fetch` and cache its result.
    ///
    /// # Errors
    ///
    /// Returns whatever `fetch` returns; cache failures never surface.
    pub async fn get_or_fetch<T, F>(&self, key: String, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = Result<T>>,
    {
        if let Some(value) = self.get(&key).await {
            return Ok(value);
        }
        let value = fetch.await?;
        self.populate(key, &value);
        Ok(value)
    }

    /// Flush every cached entry. A failed flush is logged and otherwise ignored.
    pub async fn invalidate_all(&self) {
        match self.cache.flush().await {
            Ok(()) => debug!("Cache flushed"),
            Err(e) => error!("Cache flush failed, entries may be stale until expiry: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::SiteError, testing::MemoryCache};

    fn read_through(cache: &Arc<MemoryCache>) -> ReadThrough {
        ReadThrough::new(cache.clone(), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn miss_fetches_and_populates() -> Result<()> {
        let cache = Arc::new(MemoryCache::default());
        let reads = read_through(&cache);

        let value: Vec<i32> = reads
            .get_or_fetch("numbers".to_string(), async { Ok(vec![1, 2, 3]) })
            .await?;
        assert_eq!(value, vec![1, 2, 3]);

        cache.wait_for_key("numbers").await;
        assert_eq!(cache.raw("numbers").as_deref(), Some("[1,2,3]"));
        Ok(())
    }

    #[tokio::test]
    async fn hit_skips_fetch() -> Result<()> {
        let cache = Arc::new(MemoryCache::default());
        cache.insert("numbers", "[7]");

        let value: Vec<i32> = read_through(&cache)
            .get_or_fetch("numbers".to_string(), async {
                Err(SiteError::NotFound("should not be fetched".into()))
            })
            .await?;
        assert_eq!(value, vec![7]);
        Ok(())
    }

    #[tokio::test]
    async fn transport_error_reads_through() -> Result<()> {
        let cache = Arc::new(MemoryCache::default());
        cache.insert("numbers", "[7]");
        cache.set_unavailable(true);

        let value: Vec<i32> = read_through(&cache)
            .get_or_fetch("numbers".to_string(), async { Ok(vec![9]) })
            .await?;
        assert_eq!(value, vec![9]);
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_miss() {
        let cache = Arc::new(MemoryCache::default());
        cache.insert("numbers", "{not json");
        assert_eq!(read_through(&cache).get::<Vec<i32>>("numbers").await, None);
    }

    #[tokio::test]
    async fn flush_failure_is_swallowed() {
        let cache = Arc::new(MemoryCache::default());
        cache.insert("numbers", "[7]");
        cache.set_unavailable(true);

        read_through(&cache).invalidate_all().await;

        assert_eq!(cache.flushes(), 0);
        assert!(cache.raw("numbers").is_some());
    }

    #[tokio::test]
    async fn fetch_errors_are_not_cached() {
        let cache = Arc::new(MemoryCache::default());
        let result: Result<Vec<i32>> = read_through(&cache)
            .get_or_fetch("numbers".to_string(), async {
                Err(SiteError::InvalidInput("bad".into()))
            })
            .await;

        assert!(result.is_err());
        tokio::task::yield_now().await;
        assert!(cache.raw("numbers").is_none());
    }
}
