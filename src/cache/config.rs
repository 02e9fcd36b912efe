use serde::{Deserialize, Serialize};

/// Configuration for the cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries.
    pub capacity: usize,
    /// Maximum total bytes of keys and values. `0` means unbounded.
    pub max_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 1024, max_size: 0 }
    }
}

impl CacheConfig {
    pub fn bounded(capacity: usize, max_size: u64) -> Self {
        Self { capacity, max_size }
    }
}
