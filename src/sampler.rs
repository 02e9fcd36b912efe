use crate::config::SamplingConfig;
use crate::handles::MetricHandleCache;
use crate::logger::SAMPLER_TARGET;
use crate::sink::{CounterHandle, MetricSink};
use crate::types::{CATEGORY, CacheStat};
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub caches: usize,
    /// Values written to the sink.
    pub written: usize,
    /// (cache, metric) pairs with no handle this pass.
    pub skipped: usize,
    /// Writes the sink rejected through an open handle.
    pub failed: usize,
}

/// Publishes one snapshot of cache statistics.
pub struct Sampler<S: MetricSink> {
    handles: MetricHandleCache<S>,
}

impl<S: MetricSink> Sampler<S> {
    pub fn new(sink: Arc<S>) -> Self {
        Self { handles: MetricHandleCache::new(sink) }
    }

    /// Write every enabled metric for every cache, in snapshot order.
    ///
    /// A missing handle or a rejected write only affects that one (cache, metric) pair.
    /// Handles of caches absent from `caches` are released afterwards.
    pub fn run_pass(&mut self, caches: &[CacheStat], config: &SamplingConfig) -> PassReport {
        let mut report = PassReport { caches: caches.len(), ..Default::default() };
        for cache in caches {
            for kind in config.enabled_kinds() {
                let counter = kind.counter_name();
                let Some(handle) = self.handles.resolve(CATEGORY, counter, &cache.name) else {
                    report.skipped += 1;
                    continue;
                };
                match handle.set_value(kind.value_of(cache)) {
                    Ok(()) => report.written += 1,
                    Err(e) => {
                        log::debug!(target: SAMPLER_TARGET, "write {counter}/{} failed: {e}", cache.name);
                        self.handles.invalidate(counter, &cache.name);
                        report.failed += 1;
                    }
                }
            }
        }
        let live: HashSet<&str> = caches.iter().map(|c| c.name.as_str()).collect();
        self.handles.retain_instances(&live);
        log::trace!(target: SAMPLER_TARGET, "{report:?}");
        report
    }

    pub fn handles(&self) -> &MetricHandleCache<S> {
        &self.handles
    }
}
