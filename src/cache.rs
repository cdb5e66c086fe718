use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::error::FlagshipError;
use crate::model::FeatureFlag;

struct Entry {
    value: Option<FeatureFlag>,
    expires_at: Instant,
}

/// Read-through TTL cache in front of flag lookups.
///
/// Holds a time-bounded copy of flag state keyed by flag name, never the
/// source of truth. Negative lookups are cached too. Writers invalidate
/// through [`FlagCache::forget`] before returning, which gives
/// read-after-write consistency; a read that raced the invalidation may
/// observe stale data for up to one TTL.
pub struct FlagCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl FlagCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh cached value for `key`, if any. The outer `None` is a miss;
    /// `Some(None)` is a cached "flag does not exist".
    pub async fn get(&self, key: &str) -> Option<Option<FeatureFlag>> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Return the cached value for `key`, or run `supplier` and cache its
    /// result for one TTL. A supplier error is propagated and nothing is
    /// cached.
    pub async fn remember<F, Fut>(
        &self,
        key: &str,
        supplier: F,
    ) -> Result<Option<FeatureFlag>, FlagshipError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<FeatureFlag>, FlagshipError>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }
        let value = supplier().await?;
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(value)
    }

    /// Drop the entry for `key`.
    pub async fn forget(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remember_caches_supplier_result() {
        let cache = FlagCache::new(Duration::from_secs(60));
        let flag = FeatureFlag::new("f", true);

        let value = cache
            .remember("f", || async { Ok(Some(flag.clone())) })
            .await
            .unwrap();
        assert_eq!(value, Some(flag.clone()));

        // second read hits the cache, supplier not consulted
        let value = cache
            .remember("f", || async { panic!("supplier should not run") })
            .await
            .unwrap();
        assert_eq!(value, Some(flag));
    }

    #[tokio::test]
    async fn negative_lookups_are_cached() {
        let cache = FlagCache::new(Duration::from_secs(60));
        let value = cache.remember("ghost", || async { Ok(None) }).await.unwrap();
        assert_eq!(value, None);
        assert_eq!(cache.get("ghost").await, Some(None));
    }

    #[tokio::test]
    async fn forget_invalidates() {
        let cache = FlagCache::new(Duration::from_secs(60));
        cache
            .remember("f", || async { Ok(Some(FeatureFlag::new("f", false))) })
            .await
            .unwrap();
        cache.forget("f").await;
        assert!(cache.get("f").await.is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let cache = FlagCache::new(Duration::from_millis(0));
        cache
            .remember("f", || async { Ok(Some(FeatureFlag::new("f", true))) })
            .await
            .unwrap();
        assert!(cache.get("f").await.is_none());
    }

    #[tokio::test]
    async fn supplier_errors_are_not_cached() {
        let cache = FlagCache::new(Duration::from_secs(60));
        let result = cache
            .remember("f", || async { Err(FlagshipError::Store("down".into())) })
            .await;
        assert!(result.is_err());
        assert!(cache.get("f").await.is_none());
    }
}
