use crate::cache::metrics::CacheMetrics;
use crate::cache::size::entry_size;
use lru::LruCache;
use std::sync::atomic::Ordering;

/// Evicts least-recently-used entries until one more entry of `incoming` bytes fits both the
/// entry capacity and the byte budget (`max_size == 0` is unbounded). Returns number evicted.
pub fn evict_to_fit(
    store: &mut LruCache<String, Vec<u8>>,
    metrics: &CacheMetrics,
    max_size: u64,
    incoming: u64,
) -> usize {
    let cap = store.cap().get();
    let mut evicted = 0usize;
    loop {
        let used = metrics.memory_bytes.load(Ordering::Relaxed);
        let over_count = store.len() >= cap;
        let over_bytes = max_size > 0 && used.saturating_add(incoming) > max_size;
        if !(over_count || over_bytes) {
            break;
        }
        let Some((key, value)) = store.pop_lru() else { break };
        metrics.memory_bytes.fetch_sub(entry_size(&key, &value), Ordering::Relaxed);
        evicted += 1;
    }
    if evicted > 0 {
        metrics.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        log::trace!("evicted {evicted} entries to fit {incoming} bytes");
    }
    evicted
}
