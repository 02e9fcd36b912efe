use crate::logger::SAMPLER_TARGET;
use crate::sink::MetricSink;
use crate::types::HandleKey;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Lazily opened counter handles, keyed by (metric, instance).
///
/// Successful opens are kept and reused; failed opens are not remembered, so the next
/// `resolve` for the same key tries the sink again. Not synchronized: one pass at a time.
pub struct MetricHandleCache<S: MetricSink> {
    sink: Arc<S>,
    handles: HashMap<HandleKey, S::Handle>,
}

impl<S: MetricSink> MetricHandleCache<S> {
    pub fn new(sink: Arc<S>) -> Self {
        Self { sink, handles: HashMap::new() }
    }

    /// Get the handle for `metric`/`instance`, opening it under `category` on first use.
    /// Returns `None` if the sink refuses to open it.
    pub fn resolve(&mut self, category: &str, metric: &str, instance: &str) -> Option<&S::Handle> {
        let key = HandleKey::new(metric, instance);
        if !self.handles.contains_key(&key) {
            match self.sink.open_counter(category, metric, instance) {
                Ok(handle) => {
                    log::debug!(target: SAMPLER_TARGET, "opened counter {key}");
                    self.handles.insert(key.clone(), handle);
                }
                Err(e) => {
                    log::debug!(target: SAMPLER_TARGET, "counter {key} unavailable: {e}");
                    return None;
                }
            }
        }
        self.handles.get(&key)
    }

    /// Forget a handle so the next `resolve` reopens it.
    pub fn invalidate(&mut self, metric: &str, instance: &str) -> bool {
        self.handles.remove(&HandleKey::new(metric, instance)).is_some()
    }

    /// Drop every handle whose instance is not in `live`. Returns how many were dropped.
    pub fn retain_instances(&mut self, live: &HashSet<&str>) -> usize {
        let before = self.handles.len();
        self.handles.retain(|key, _| live.contains(key.instance.as_str()));
        let dropped = before - self.handles.len();
        if dropped > 0 {
            log::debug!(target: SAMPLER_TARGET, "released {dropped} handles of departed caches");
        }
        dropped
    }

    pub fn contains(&self, metric: &str, instance: &str) -> bool {
        self.handles.contains_key(&HandleKey::new(metric, instance))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn clear(&mut self) {
        self.handles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{CounterHandle, MemorySink};
    use crate::types::CATEGORY;

    #[test]
    fn successful_handles_are_reused() {
        let sink = Arc::new(MemorySink::with_cache_counters());
        let mut cache = MetricHandleCache::new(sink.clone());
        for v in 0..5 {
            cache.resolve(CATEGORY, "CacheCount", "html").unwrap().set_value(v).unwrap();
        }
        assert_eq!(sink.open_attempts(), 1);
        assert_eq!(sink.writes(), 5);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failures_are_retried_every_time() {
        let sink = Arc::new(MemorySink::with_cache_counters());
        sink.deny("CacheCount", "html");
        let mut cache = MetricHandleCache::new(sink.clone());
        assert!(cache.resolve(CATEGORY, "CacheCount", "html").is_none());
        assert!(cache.resolve(CATEGORY, "CacheCount", "html").is_none());
        assert_eq!(sink.open_attempts(), 2);
        assert!(cache.is_empty());

        sink.allow("CacheCount", "html");
        assert!(cache.resolve(CATEGORY, "CacheCount", "html").is_some());
        assert!(cache.resolve(CATEGORY, "CacheCount", "html").is_some());
        assert_eq!(sink.open_attempts(), 3);
    }

    #[test]
    fn keys_separate_metrics_and_instances() {
        let sink = Arc::new(MemorySink::with_cache_counters());
        let mut cache = MetricHandleCache::new(sink.clone());
        cache.resolve(CATEGORY, "CacheCount", "html").unwrap();
        cache.resolve(CATEGORY, "CacheSize", "html").unwrap();
        cache.resolve(CATEGORY, "CacheCount", "css").unwrap();
        assert_eq!(cache.len(), 3);
        assert!(cache.contains("CacheSize", "html"));
        assert!(!cache.contains("CacheSize", "css"));
    }

    #[test]
    fn departed_instances_are_released() {
        let sink = Arc::new(MemorySink::with_cache_counters());
        let mut cache = MetricHandleCache::new(sink.clone());
        cache.resolve(CATEGORY, "CacheCount", "html").unwrap();
        cache.resolve(CATEGORY, "CacheSize", "html").unwrap();
        cache.resolve(CATEGORY, "CacheCount", "css").unwrap();
        assert_eq!(cache.retain_instances(&HashSet::from(["html"])), 1);
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("CacheCount", "css"));
        assert_eq!(cache.retain_instances(&HashSet::new()), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_forces_a_reopen() {
        let sink = Arc::new(MemorySink::with_cache_counters());
        let mut cache = MetricHandleCache::new(sink.clone());
        cache.resolve(CATEGORY, "CacheCount", "html").unwrap();
        assert!(cache.invalidate("CacheCount", "html"));
        assert!(!cache.invalidate("CacheCount", "html"));
        cache.resolve(CATEGORY, "CacheCount", "html").unwrap();
        assert_eq!(sink.open_attempts(), 2);
    }
}
