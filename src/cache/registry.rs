use crate::cache::config::CacheConfig;
use crate::cache::core::Cache;
use crate::errors::CounterError;
use crate::source::CacheSnapshotSource;
use crate::types::CacheStat;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Named caches of one process. Enumerates in name order.
#[derive(Default)]
pub struct CacheRegistry {
    caches: RwLock<BTreeMap<String, Cache>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cache called `name`, creating it with `config` if it does not exist yet.
    pub fn register(&self, name: &str, config: CacheConfig) -> Cache {
        self.caches
            .write()
            .entry(name.to_owned())
            .or_insert_with(|| {
                log::debug!("registered cache {name}");
                Cache::new_with_config(config)
            })
            .clone()
    }

    pub fn unregister(&self, name: &str) -> Option<Cache> {
        self.caches.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Cache> {
        self.caches.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.caches.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.caches.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.read().is_empty()
    }
}

impl CacheSnapshotSource for CacheRegistry {
    fn enumerate(&self) -> Result<Vec<CacheStat>, CounterError> {
        Ok(self.caches.read().iter().map(|(name, cache)| cache.stat(name)).collect())
    }
}
