use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::{CacheAdapter, CacheAdapterExt};
use crate::config::CacheSettings;
use crate::models::{Currency, Money};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedBalance {
    amount: rust_decimal::Decimal,
    currency: Currency,
    version: i32,
}

/// Thin, key-convention wrapper over a [`CacheAdapter`] for account
/// balances. Failures never surface to callers: a cache miss or backend
/// outage simply means the caller falls back to the database.
#[derive(Clone)]
pub struct BalanceCache {
    adapter: Arc<dyn CacheAdapter>,
    settings: CacheSettings,
}

impl BalanceCache {
    pub fn new(adapter: Arc<dyn CacheAdapter>, settings: CacheSettings) -> Self {
        Self { adapter, settings }
    }

    fn balance_key(&self, account_id: Uuid) -> String {
        format!("{}:balance:{}", self.settings.key_prefix, account_id)
    }

    fn account_key(&self, account_id: Uuid) -> String {
        format!("{}:account:{}", self.settings.key_prefix, account_id)
    }

    pub async fn get(&self, account_id: Uuid, version: i32) -> Option<Money> {
        if !self.settings.enabled {
            return None;
        }
        let cached: CachedBalance = self.adapter.get_json(&self.balance_key(account_id)).await?;
        if cached.version != version {
            return None;
        }
        Money::new(cached.amount, cached.currency).ok()
    }

    /// Cache-first lookup that doesn't require the caller to already know
    /// `version` (which otherwise only comes from the DB row this cache
    /// exists to avoid reading). Returns the cached balance alongside the
    /// version it was stored under, so a miss can fall through to the
    /// database without a wasted round trip on the hit path.
    pub async fn get_any(&self, account_id: Uuid) -> Option<(Money, i32)> {
        if !self.settings.enabled {
            return None;
        }
        let cached: CachedBalance = self.adapter.get_json(&self.balance_key(account_id)).await?;
        let money = Money::new(cached.amount, cached.currency).ok()?;
        Some((money, cached.version))
    }

    pub async fn set(&self, account_id: Uuid, balance: Money, version: i32) -> bool {
        if !self.settings.enabled {
            return false;
        }
        let cached = CachedBalance {
            amount: balance.amount(),
            currency: balance.currency(),
            version,
        };
        self.adapter
            .set_json(&self.balance_key(account_id), &cached, self.settings.balance_ttl_secs)
            .await
    }

    /// Invalidates both the `balance:{id}` and `account:{id}` cache keys
    /// for an account, as required on every balance-mutating write.
    pub async fn invalidate(&self, account_id: Uuid) {
        if !self.settings.enabled {
            return;
        }
        self.adapter.delete(&self.balance_key(account_id)).await;
        self.adapter.delete(&self.account_key(account_id)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::cache::CacheStats;

    #[derive(Default)]
    struct FakeAdapter {
        store: Mutex<std::collections::HashMap<String, String>>,
        stats: Arc<CacheStats>,
    }

    #[async_trait]
    impl CacheAdapter for FakeAdapter {
        async fn get(&self, key: &str) -> Option<String> {
            self.store.lock().unwrap().get(key).cloned()
        }
        async fn set(&self, key: &str, value: &str, _ttl_secs: u64) -> bool {
            self.store.lock().unwrap().insert(key.to_string(), value.to_string());
            true
        }
        async fn delete(&self, key: &str) -> bool {
            self.store.lock().unwrap().remove(key);
            true
        }
        fn stats(&self) -> Arc<CacheStats> {
            self.stats.clone()
        }
    }

    fn settings() -> CacheSettings {
        CacheSettings {
            enabled: true,
            balance_ttl_secs: 60,
            key_prefix: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn set_then_get_round_trips_at_matching_version() {
        let adapter: Arc<dyn CacheAdapter> = Arc::new(FakeAdapter::default());
        let cache = BalanceCache::new(adapter, settings());
        let account_id = Uuid::new_v4();
        let money = Money::parse("42.50", Currency::USD).unwrap();

        assert!(cache.set(account_id, money, 3).await);
        let fetched = cache.get(account_id, 3).await.unwrap();
        assert_eq!(fetched.amount(), money.amount());
    }

    #[tokio::test]
    async fn stale_version_misses() {
        let adapter: Arc<dyn CacheAdapter> = Arc::new(FakeAdapter::default());
        let cache = BalanceCache::new(adapter, settings());
        let account_id = Uuid::new_v4();
        let money = Money::parse("10.00", Currency::USD).unwrap();

        cache.set(account_id, money, 1).await;
        assert!(cache.get(account_id, 2).await.is_none());
    }

    #[tokio::test]
    async fn get_any_returns_cached_balance_without_a_known_version() {
        let adapter: Arc<dyn CacheAdapter> = Arc::new(FakeAdapter::default());
        let cache = BalanceCache::new(adapter, settings());
        let account_id = Uuid::new_v4();
        let money = Money::parse("42.50", Currency::USD).unwrap();

        cache.set(account_id, money, 5).await;
        let (fetched, version) = cache.get_any(account_id).await.unwrap();
        assert_eq!(fetched.amount(), money.amount());
        assert_eq!(version, 5);
    }

    #[tokio::test]
    async fn invalidate_clears_both_keys() {
        let adapter: Arc<dyn CacheAdapter> = Arc::new(FakeAdapter::default());
        let cache = BalanceCache::new(adapter, settings());
        let account_id = Uuid::new_v4();
        let money = Money::parse("10.00", Currency::USD).unwrap();

        cache.set(account_id, money, 1).await;
        cache.invalidate(account_id).await;
        assert!(cache.get(account_id, 1).await.is_none());
    }
}
