use cachecounters::sampler::Sampler;
use cachecounters::sink::MemorySink;
use cachecounters::{CacheStat, MetricKind, SamplingConfig};
use proptest::prelude::*;
use std::sync::Arc;

fn stats() -> impl Strategy<Value = Vec<CacheStat>> {
    proptest::collection::btree_map("[a-z]{1,8}", (any::<u64>(), any::<u64>(), any::<u64>()), 0..12)
        .prop_map(|m| m.into_iter().map(|(name, (c, s, x))| CacheStat::new(name, c, s, x)).collect())
}

fn kind() -> impl Strategy<Value = MetricKind> {
    prop_oneof![Just(MetricKind::Count), Just(MetricKind::Size), Just(MetricKind::MaxSize)]
}

proptest! {
    #[test]
    fn prop_all_flags_off_never_touches_the_sink(caches in stats(), passes in 1usize..4) {
        let sink = Arc::new(MemorySink::with_cache_counters());
        let mut sampler = Sampler::new(sink.clone());
        for _ in 0..passes {
            let report = sampler.run_pass(&caches, &SamplingConfig::none(1000));
            prop_assert_eq!(report.written, 0);
        }
        prop_assert_eq!(sink.writes(), 0);
        prop_assert_eq!(sink.open_attempts(), 0);
    }

    #[test]
    fn prop_single_flag_writes_one_value_per_cache(caches in stats(), kind in kind()) {
        let sink = Arc::new(MemorySink::with_cache_counters().journaled());
        let mut sampler = Sampler::new(sink.clone());
        let report = sampler.run_pass(&caches, &SamplingConfig::only(kind, 1000));
        prop_assert_eq!(report.written, caches.len());
        prop_assert_eq!(sink.writes(), caches.len() as u64);
        for cache in &caches {
            prop_assert_eq!(sink.writes_for(kind.counter_name(), &cache.name), vec![kind.value_of(cache)]);
            for other in MetricKind::ALL.into_iter().filter(|k| *k != kind) {
                prop_assert!(sink.value(other.counter_name(), &cache.name).is_none());
            }
        }
    }

    #[test]
    fn prop_handles_open_once_per_pair(caches in stats(), passes in 1usize..5) {
        let sink = Arc::new(MemorySink::with_cache_counters());
        let mut sampler = Sampler::new(sink.clone());
        for _ in 0..passes {
            sampler.run_pass(&caches, &SamplingConfig::default());
        }
        prop_assert_eq!(sink.open_attempts(), 3 * caches.len() as u64);
        prop_assert_eq!(sink.writes(), (3 * caches.len() * passes) as u64);
    }
}
