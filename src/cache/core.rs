use crate::cache::config::CacheConfig;
use crate::cache::metrics::{CacheMetrics, CacheMetricsSnapshot};
use crate::cache::policy::evict_to_fit;
use crate::cache::size::entry_size;
use crate::types::CacheStat;
use lru::LruCache;
use parking_lot::RwLock;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn non_zero(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

/// A thread-safe, in-memory LRU cache bounded by entry count and total bytes.
#[derive(Clone)]
pub struct Cache {
    store: Arc<RwLock<LruCache<String, Vec<u8>>>>,
    config: Arc<RwLock<CacheConfig>>, // runtime adjustable
    pub metrics: Arc<CacheMetrics>,
}

impl Cache {
    /// Creates a new cache with a given capacity and no byte budget.
    pub fn new(capacity: usize) -> Self {
        Self::new_with_config(CacheConfig { capacity, ..Default::default() })
    }

    /// Creates a new cache with the provided configuration.
    pub fn new_with_config(config: CacheConfig) -> Self {
        Cache {
            store: Arc::new(RwLock::new(LruCache::new(non_zero(config.capacity)))),
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(CacheMetrics::default()),
        }
    }

    /// Inserts a value, evicting least-recently-used entries as needed.
    ///
    /// Returns `false` without storing anything if the entry alone exceeds the byte budget.
    pub fn insert(&self, key: impl Into<String>, value: Vec<u8>) -> bool {
        let key = key.into();
        let size = entry_size(&key, &value);
        let max_size = self.config.read().max_size;
        if max_size > 0 && size > max_size {
            self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let mut store = self.store.write();
        if let Some(prev) = store.pop(&key) {
            self.metrics.memory_bytes.fetch_sub(entry_size(&key, &prev), Ordering::Relaxed);
        }
        evict_to_fit(&mut store, &self.metrics, max_size, size);
        store.put(key, value);
        self.metrics.memory_bytes.fetch_add(size, Ordering::Relaxed);
        self.metrics.inserts.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Retrieves a value and marks it most recently used.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut store = self.store.write();
        match store.get(key) {
            Some(v) => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                Some(v.clone())
            }
            None => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Removes a value from the cache.
    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        let removed = self.store.write().pop(key);
        if let Some(v) = &removed {
            self.metrics.memory_bytes.fetch_sub(entry_size(key, v), Ordering::Relaxed);
            self.metrics.removes.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Clears the cache.
    pub fn clear(&self) {
        let mut store = self.store.write();
        store.clear();
        self.metrics.memory_bytes.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    /// Current total bytes of keys and values.
    pub fn size_bytes(&self) -> u64 {
        self.metrics.memory_bytes.load(Ordering::Relaxed)
    }

    pub fn max_size(&self) -> u64 {
        self.config.read().max_size
    }

    /// Change the byte budget, evicting down to it immediately.
    pub fn set_max_size(&self, max_size: u64) {
        self.config.write().max_size = max_size;
        let mut store = self.store.write();
        while max_size > 0 && self.size_bytes() > max_size {
            let Some((k, v)) = store.pop_lru() else { break };
            self.metrics.memory_bytes.fetch_sub(entry_size(&k, &v), Ordering::Relaxed);
            self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Change the entry capacity, evicting least-recently-used entries if it shrinks.
    pub fn set_capacity(&self, capacity: usize) {
        let nz = non_zero(capacity);
        self.config.write().capacity = nz.get();
        let mut store = self.store.write();
        while store.len() > nz.get() {
            let Some((k, v)) = store.pop_lru() else { break };
            self.metrics.memory_bytes.fetch_sub(entry_size(&k, &v), Ordering::Relaxed);
            self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
        }
        store.resize(nz);
    }

    /// Statistics for publishing under `name`.
    pub fn stat(&self, name: &str) -> CacheStat {
        let store = self.store.read();
        CacheStat::new(name, store.len() as u64, self.size_bytes(), self.max_size())
    }

    /// Get a snapshot of metrics.
    pub fn metrics_snapshot(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }
}
