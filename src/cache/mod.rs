pub mod balance_cache;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use balance_cache::BalanceCache;

/// Cache statistics for monitoring, shared across adapter clones.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub invalidations: AtomicU64,
    pub errors: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn get_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn get_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn get_invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    pub fn get_errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Abstraction over the cache tier used by account/balance lookups. Every
/// method is infallible to the caller: a backend outage degrades to a miss
/// (`get` -> `None`) or a no-op (`set`/`delete` -> `false`), never an error
/// that would block a read path that can fall back to the database.
///
/// Kept free of generic methods so `Arc<dyn CacheAdapter>` stays constructible;
/// the typed `get_json`/`set_json` helpers live on [`CacheAdapterExt`] instead.
#[async_trait]
pub trait CacheAdapter: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> bool;
    async fn delete(&self, key: &str) -> bool;

    fn stats(&self) -> Arc<CacheStats>;
}

/// JSON convenience helpers over any [`CacheAdapter`], including trait
/// objects (`dyn CacheAdapter` satisfies the blanket impl's bound).
#[async_trait]
pub trait CacheAdapterExt: CacheAdapter {
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        serde_json::from_str(&raw).ok()
    }

    async fn set_json<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl_secs: u64) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw, ttl_secs).await,
            Err(_) => false,
        }
    }
}

impl<T: CacheAdapter + ?Sized> CacheAdapterExt for T {}

/// Redis-backed [`CacheAdapter`]. Connection or command failures are logged
/// and degrade to the infallible contract rather than propagating.
pub struct RedisCacheAdapter {
    client: redis::Client,
    stats: Arc<CacheStats>,
}

impl RedisCacheAdapter {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            stats: Arc::new(CacheStats::new()),
        }
    }
}

#[async_trait]
impl CacheAdapter for RedisCacheAdapter {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                self.stats.record_error();
                tracing::warn!(error = %e, "redis connection error on cache get");
                return None;
            }
        };

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(v)) => {
                self.stats.record_hit();
                Some(v)
            }
            Ok(None) => {
                self.stats.record_miss();
                None
            }
            Err(e) => {
                self.stats.record_error();
                tracing::warn!(error = %e, %key, "redis get error");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> bool {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                self.stats.record_error();
                tracing::warn!(error = %e, "redis connection error on cache set");
                return false;
            }
        };

        match conn.set_ex::<_, _, ()>(key, value, ttl_secs).await {
            Ok(_) => true,
            Err(e) => {
                self.stats.record_error();
                tracing::warn!(error = %e, %key, "redis set error");
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                self.stats.record_error();
                tracing::warn!(error = %e, "redis connection error on cache delete");
                return false;
            }
        };

        match conn.del::<_, i64>(key).await {
            Ok(n) => {
                if n > 0 {
                    self.stats.record_invalidation();
                }
                true
            }
            Err(e) => {
                self.stats.record_error();
                tracing::warn!(error = %e, %key, "redis del error");
                false
            }
        }
    }

    fn stats(&self) -> Arc<CacheStats> {
        self.stats.clone()
    }
}
