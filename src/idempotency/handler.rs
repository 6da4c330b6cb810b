use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::cache::{CacheAdapter, CacheAdapterExt};
use crate::error::Result;
use crate::idempotency::key_generator;
use crate::idempotency::storage::{IdempotencyRecord, PostgresIdempotencyStore};

/// Counters exposed at `/metrics`; `duplicate_rate` is the fraction of
/// `check` calls that found a live record, i.e. the fraction of requests the
/// Payment Engine turned away as `DuplicateTransaction`.
#[derive(Debug, Default)]
pub struct IdempotencyMetrics {
    pub checks: AtomicU64,
    pub cache_hits: AtomicU64,
    pub store_hits: AtomicU64,
    pub misses: AtomicU64,
}

impl IdempotencyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.checks.fetch_add(1, Ordering::Relaxed);
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_hit(&self) {
        self.checks.fetch_add(1, Ordering::Relaxed);
        self.store_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.checks.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            checks: self.checks.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            store_hits: self.store_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub checks: u64,
    pub cache_hits: u64,
    pub store_hits: u64,
    pub misses: u64,
}

impl MetricsSnapshot {
    pub fn duplicate_rate(&self) -> f64 {
        if self.checks == 0 {
            0.0
        } else {
            (self.cache_hits + self.store_hits) as f64 / self.checks as f64
        }
    }
}

/// Result of an idempotency check, as seen by the Payment Engine. The
/// manager itself never decides whether a hit means "duplicate" — that
/// call belongs to the engine.
#[derive(Debug, Clone)]
pub enum IdempotencyCheckResult {
    New,
    Found(Value),
}

#[derive(Debug, Clone)]
pub struct IdempotencyManagerConfig {
    pub ttl_seconds: i64,
    pub key_prefix: String,
}

impl Default for IdempotencyManagerConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 86400,
            key_prefix: "idem".to_string(),
        }
    }
}

/// Bridges the durable [`PostgresIdempotencyStore`] and a fast
/// [`CacheAdapter`] tier behind a two-operation contract: `check` and
/// `store`. The store is authoritative; the cache only accelerates reads
/// and is rebuilt from the store on a miss.
pub struct IdempotencyManager {
    store: PostgresIdempotencyStore,
    cache: Arc<dyn CacheAdapter>,
    config: IdempotencyManagerConfig,
    metrics: Arc<IdempotencyMetrics>,
}

impl IdempotencyManager {
    pub fn new(store: PostgresIdempotencyStore, cache: Arc<dyn CacheAdapter>, config: IdempotencyManagerConfig) -> Self {
        Self {
            store,
            cache,
            config,
            metrics: Arc::new(IdempotencyMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<IdempotencyMetrics> {
        Arc::clone(&self.metrics)
    }

    fn cache_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }

    /// Stable hex digest of a request's business-relevant fields, for
    /// detecting a key reused with a different payload.
    pub fn hash(&self, fields: &Value) -> String {
        key_generator::hash_request(fields)
    }

    /// Fast path: cache, then store. A store hit repopulates the cache with
    /// the record's remaining TTL so it doesn't outlive the durable record.
    pub async fn check(&self, key: &str) -> Result<IdempotencyCheckResult> {
        let cache_key = self.cache_key(key);

        if let Some(cached) = self.cache.get_json::<Value>(&cache_key).await {
            self.metrics.record_cache_hit();
            return Ok(IdempotencyCheckResult::Found(cached));
        }

        match self.store.find_live(key).await? {
            Some(record) => {
                self.metrics.record_store_hit();
                self.cache
                    .set_json(&cache_key, &record.response_data, record.remaining_ttl_seconds())
                    .await;
                Ok(IdempotencyCheckResult::Found(record.response_data))
            }
            None => {
                self.metrics.record_miss();
                Ok(IdempotencyCheckResult::New)
            }
        }
    }

    /// Persists a record with `expires_at = now + TTL` and writes the same
    /// response into the cache tier.
    pub async fn store(
        &self,
        key: &str,
        transaction_id: Option<Uuid>,
        response_data: Value,
        request_hash: Option<String>,
    ) -> Result<()> {
        let record = IdempotencyRecord::new(
            key.to_string(),
            transaction_id,
            response_data.clone(),
            request_hash,
            self.config.ttl_seconds,
        );
        self.store.insert(&record).await?;
        self.cache
            .set_json(&self.cache_key(key), &response_data, self.config.ttl_seconds as u64)
            .await;
        Ok(())
    }

    pub async fn cleanup_expired(&self) -> Result<u64> {
        self.store.delete_expired().await
    }
}

/// Optional background sweep of physically expired rows. Its absence is
/// harmless: lookups already filter by `expires_at`.
pub struct IdempotencyCleanupJob {
    manager: Arc<IdempotencyManager>,
    interval_seconds: u64,
}

impl IdempotencyCleanupJob {
    pub fn new(manager: Arc<IdempotencyManager>, interval_seconds: u64) -> Self {
        Self {
            manager,
            interval_seconds,
        }
    }

    pub async fn run_once(&self) -> Result<u64> {
        self.manager.cleanup_expired().await
    }

    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(self.interval_seconds));
            loop {
                interval.tick().await;
                match self.manager.cleanup_expired().await {
                    Ok(count) if count > 0 => {
                        tracing::info!(count, "swept expired idempotency records");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "idempotency cleanup sweep failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_rate_over_mixed_checks() {
        let metrics = IdempotencyMetrics::new();
        metrics.record_miss();
        metrics.record_cache_hit();
        metrics.record_store_hit();
        metrics.record_miss();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.checks, 4);
        assert_eq!(snapshot.duplicate_rate(), 0.5);
    }

    #[test]
    fn default_config_has_24_hour_ttl() {
        let config = IdempotencyManagerConfig::default();
        assert_eq!(config.ttl_seconds, 86400);
    }
}
