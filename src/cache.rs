//! TTL read cache for the dashboard queries.
//!
//! The vehicle listing and detail endpoints are read-heavy and tolerate
//! slightly stale data, so results are cached for a few minutes instead of
//! invalidating on every write. Expired entries are dropped lazily on access and the oldest
//! entry is evicted once the cache is full.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::Mutex;

struct Entry<V> {
    value: V,
    created_at: Instant,
}

pub struct TtlCache<V> {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| e.created_at.elapsed() <= self.ttl);
        entries.get(key).map(|e| e.value.clone())
    }

    pub async fn insert(&self, key: String, value: V) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| e.created_at.elapsed() <= self.ttl);
        if entries.len() >= self.max_entries {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&victim);
            }
        }
        entries.insert(
            key,
            Entry {
                value,
                created_at: Instant::now(),
            },
        );
    }

    /// Return the cached value for `key`, or run `compute` and cache its
    /// result. The lock is not held while computing, so concurrent misses on
    /// the same key may compute twice; the last result wins.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }
        let value = compute().await?;
        self.insert(key.to_string(), value.clone()).await;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_get_or_compute_caches_result() {
        let cache: TtlCache<i64> = TtlCache::new(Duration::from_secs(60), 16);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_compute("answer", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let cache: TtlCache<i64> = TtlCache::new(Duration::from_millis(20), 16);
        let calls = AtomicUsize::new(0);

        let compute = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        };
        cache.get_or_compute("k", compute).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache
            .get_or_compute("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_oldest_entry_evicted_when_full() {
        let cache: TtlCache<i64> = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert("a".to_string(), 1).await;
        cache.insert("b".to_string(), 2).await;
        cache.insert("c".to_string(), 3).await;

        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.get("b").await, Some(2));
        assert_eq!(cache.get("c").await, Some(3));
    }

    #[tokio::test]
    async fn test_compute_error_is_not_cached() {
        let cache: TtlCache<i64> = TtlCache::new(Duration::from_secs(60), 16);

        let result = cache
            .get_or_compute("k", || async { Err(anyhow::anyhow!("query failed")) })
            .await;
        assert!(result.is_err());

        let value = cache.get_or_compute("k", || async { Ok(9) }).await.unwrap();
        assert_eq!(value, 9);
    }
}
