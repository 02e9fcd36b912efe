use crate::errors::CounterError;
use crate::types::CacheStat;

/// Enumerates the caches that exist right now.
///
/// Called once per pass, so it should be cheap. Nothing about identity is assumed across
/// calls beyond the cache name.
pub trait CacheSnapshotSource: Send + Sync {
    fn enumerate(&self) -> Result<Vec<CacheStat>, CounterError>;
}

impl<F> CacheSnapshotSource for F
where
    F: Fn() -> Result<Vec<CacheStat>, CounterError> + Send + Sync,
{
    fn enumerate(&self) -> Result<Vec<CacheStat>, CounterError> {
        self()
    }
}
