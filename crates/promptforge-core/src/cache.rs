// ABOUTME: TTL+LRU cache fronting repeated render/optimization calls, with single-flight recompute
use async_trait::async_trait;
use dashmap::DashMap;
use promptforge_types::CacheError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct StatsInner {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A second cache tier behind the local one (e.g. Redis), consulted on local
/// miss and written through alongside every local insert. `get_or_compute`
/// treats the local tier as authoritative for single-flight purposes: only
/// one producer per process computes a value, even if the distributed tier
/// could independently supply it.
#[async_trait]
pub trait DistributedCacheTier<V>: Send + Sync {
    async fn get(&self, key: &str) -> Option<V>;
    async fn set(&self, key: &str, value: V, ttl: Duration);
    async fn delete(&self, key: &str);
    async fn clear(&self);
}

/// Fingerprint a set of parts (e.g. template content and a serialized
/// render context) into a stable cache key. MD5 is used here purely as a
/// fast, well-distributed non-cryptographic digest, not for integrity.
pub fn fingerprint(parts: &[&str]) -> String {
    let joined = parts.join("\u{1f}");
    format!("{:x}", md5::compute(joined.as_bytes()))
}

/// In-memory TTL+LRU cache with an optional write-through distributed tier.
/// Concurrent `get_or_compute` calls for the same key collapse into a
/// single producer; the rest wait on a `Notify` and then re-read the cache.
pub struct Cache<V: Clone + Send + Sync + 'static> {
    config: CacheConfig,
    store: DashMap<String, Entry<V>>,
    order: Mutex<VecDeque<String>>,
    inflight: DashMap<String, Arc<Notify>>,
    stats: StatsInner,
    distributed: Option<Arc<dyn DistributedCacheTier<V>>>,
}

impl<V: Clone + Send + Sync + 'static> Cache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            store: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            inflight: DashMap::new(),
            stats: StatsInner::default(),
            distributed: None,
        }
    }

    pub fn with_distributed_tier(mut self, tier: Arc<dyn DistributedCacheTier<V>>) -> Self {
        self.distributed = Some(tier);
        self
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.store.get(key) {
            if entry.inserted_at.elapsed() <= self.config.ttl {
                self.touch(key).await;
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
        }
        drop(self.store.remove(key));

        if let Some(tier) = &self.distributed {
            if let Some(value) = tier.get(key).await {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                self.insert_local(key, value.clone()).await;
                return Some(value);
            }
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub async fn insert(&self, key: &str, value: V) {
        self.insert_local(key, value.clone()).await;
        if let Some(tier) = &self.distributed {
            tier.set(key, value, self.config.ttl).await;
        }
    }

    /// Return the cached value for `key`, computing it via `produce` on
    /// miss. Concurrent calls for the same key share one computation: the
    /// first caller in wins the right to produce, later callers wait on its
    /// result instead of recomputing or racing to insert.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, produce: F) -> Result<V, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, CacheError>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let notify = loop {
            // `entry` locks the shard for the duration of the closure, so the
            // "is someone already producing?" check and the "become the
            // producer" insert are atomic with respect to other callers —
            // unlike a separate `get` followed by `insert`, which would let
            // two callers both observe "absent" and both start producing.
            let mut became_producer = false;
            let notify = self
                .inflight
                .entry(key.to_string())
                .or_insert_with(|| {
                    became_producer = true;
                    Arc::new(Notify::new())
                })
                .value()
                .clone();
            if became_producer {
                break notify;
            }
            notify.notified().await;
            if let Some(value) = self.get(key).await {
                return Ok(value);
            }
            // The producer failed and left nothing cached; fall through
            // to try becoming the producer ourselves.
        };

        let result = produce().await;
        if let Ok(value) = &result {
            self.insert(key, value.clone()).await;
        }
        self.inflight.remove(key);
        notify.notify_waiters();
        result
    }

    /// Remove `key` from both the local store and, if configured, the
    /// distributed tier.
    pub async fn delete(&self, key: &str) {
        self.store.remove(key);
        self.order.lock().await.retain(|k| k != key);
        if let Some(tier) = &self.distributed {
            tier.delete(key).await;
        }
    }

    /// Drop every entry from the local store, LRU order, and (if configured)
    /// the distributed tier. Counters in `stats()` are untouched.
    pub async fn clear(&self) {
        self.store.clear();
        self.order.lock().await.clear();
        if let Some(tier) = &self.distributed {
            tier.clear().await;
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            entries: self.store.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    async fn insert_local(&self, key: &str, value: V) {
        self.store.insert(
            key.to_string(),
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
        let mut order = self.order.lock().await;
        order.retain(|k| k != key);
        order.push_back(key.to_string());
        while self.store.len() > self.config.max_entries {
            if let Some(oldest) = order.pop_front() {
                if self.store.remove(&oldest).is_some() {
                    self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %oldest, "evicted cache entry over capacity");
                }
            } else {
                break;
            }
        }
    }

    async fn touch(&self, key: &str) {
        let mut order = self.order.lock().await;
        if let Some(pos) = order.iter().position(|k| k == key) {
            if let Some(entry) = order.remove(pos) {
                order.push_back(entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn config(max_entries: usize, ttl_ms: u64) -> CacheConfig {
        CacheConfig {
            max_entries,
            ttl: Duration::from_millis(ttl_ms),
        }
    }

    #[tokio::test]
    async fn get_or_compute_caches_result() {
        let cache: Cache<String> = Cache::new(config(10, 10_000));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let value = cache
            .get_or_compute("k", || async move {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok("computed".to_string())
            })
            .await
            .unwrap();
        assert_eq!(value, "computed");

        let value2 = cache
            .get_or_compute("k", || async { Ok("recomputed".to_string()) })
            .await
            .unwrap();
        assert_eq!(value2, "computed");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_get_or_compute_single_flights() {
        let cache = Arc::new(Cache::<String>::new(config(10, 10_000)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("shared", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok("value".to_string())
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), "value");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache: Cache<String> = Cache::new(config(10, 10));
        cache.insert("k", "v".to_string()).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn evicts_least_recently_used_over_capacity() {
        let cache: Cache<String> = Cache::new(config(2, 10_000));
        cache.insert("a", "1".to_string()).await;
        cache.insert("b", "2".to_string()).await;
        cache.get("a").await; // bump "a" to most-recently-used
        cache.insert("c", "3".to_string()).await; // evicts "b"

        assert!(cache.get("b").await.is_none());
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("c").await.is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn falls_back_to_distributed_tier_on_local_miss() {
        struct MockTier {
            value: Mutex<Option<String>>,
        }
        #[async_trait]
        impl DistributedCacheTier<String> for MockTier {
            async fn get(&self, _key: &str) -> Option<String> {
                self.value.lock().await.clone()
            }
            async fn set(&self, _key: &str, value: String, _ttl: Duration) {
                *self.value.lock().await = Some(value);
            }
            async fn delete(&self, _key: &str) {
                *self.value.lock().await = None;
            }
            async fn clear(&self) {
                *self.value.lock().await = None;
            }
        }
        let tier = Arc::new(MockTier {
            value: Mutex::new(Some("from-remote".to_string())),
        });
        let cache: Cache<String> = Cache::new(config(10, 10_000)).with_distributed_tier(tier);
        assert_eq!(cache.get("remote-key").await, Some("from-remote".to_string()));
        // After the fallback hit, the value is now local too.
        assert_eq!(cache.stats().entries, 1);
    }

    #[tokio::test]
    async fn delete_removes_a_single_entry() {
        let cache: Cache<String> = Cache::new(config(10, 10_000));
        cache.insert("a", "1".to_string()).await;
        cache.insert("b", "2".to_string()).await;
        cache.delete("a").await;
        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.get("b").await, Some("2".to_string()));
    }

    #[tokio::test]
    async fn clear_empties_the_whole_cache() {
        let cache: Cache<String> = Cache::new(config(10, 10_000));
        cache.insert("a", "1".to_string()).await;
        cache.insert("b", "2".to_string()).await;
        cache.clear().await;
        assert!(cache.is_empty());
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_none());
    }

    #[test]
    fn fingerprint_is_stable_and_order_sensitive() {
        let a = fingerprint(&["template", "context"]);
        let b = fingerprint(&["template", "context"]);
        let c = fingerprint(&["context", "template"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
