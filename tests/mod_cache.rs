use cachecounters::cache::{Cache, CacheConfig, CacheRegistry};
use cachecounters::sink::MemorySink;
use cachecounters::{CacheMonitor, CacheSnapshotSource, CacheStat, SamplingConfig};
use std::sync::Arc;

#[test]
fn test_byte_budget_evicts_lru() {
    let cache = Cache::new_with_config(CacheConfig::bounded(100, 20));
    assert!(cache.insert("a", vec![0; 8]));
    assert!(cache.insert("b", vec![0; 8]));
    assert_eq!(cache.size_bytes(), 18);
    let _ = cache.get("a");
    assert!(cache.insert("c", vec![0; 8]));
    assert!(cache.get("b").is_none());
    assert!(cache.get("a").is_some());
    assert!(cache.size_bytes() <= 20);
    assert_eq!(cache.metrics_snapshot().evictions, 1);
}

#[test]
fn test_oversized_entry_is_rejected() {
    let cache = Cache::new_with_config(CacheConfig::bounded(10, 4));
    assert!(!cache.insert("big", vec![0; 16]));
    assert!(cache.is_empty());
    assert_eq!(cache.metrics_snapshot().rejected, 1);
}

#[test]
fn test_stat_tracks_contents() {
    let cache = Cache::new_with_config(CacheConfig::bounded(10, 512));
    cache.insert("k1", vec![1; 10]);
    cache.insert("k2", vec![2; 20]);
    cache.remove("k1");
    assert_eq!(cache.stat("html"), CacheStat::new("html", 1, 22, 512));
    cache.clear();
    assert_eq!(cache.stat("html"), CacheStat::new("html", 0, 0, 512));
}

#[test]
fn test_registry_feeds_the_monitor() {
    let registry = Arc::new(CacheRegistry::new());
    let html = registry.register("html", CacheConfig::bounded(64, 8192));
    for i in 0..42 {
        html.insert(format!("page{i:02}"), vec![0; 10]);
    }
    let sink = Arc::new(MemorySink::with_cache_counters());
    let cfg = SamplingConfig { interval_millis: 60_000, ..Default::default() };
    let monitor = CacheMonitor::new(sink.clone(), registry.clone(), cfg).unwrap();
    monitor.initialize().unwrap();

    assert_eq!(sink.value("CacheCount", "html"), Some(42));
    assert_eq!(sink.value("CacheSize", "html"), Some(42 * 16));
    assert_eq!(sink.value("CacheMaxSize", "html"), Some(8192));

    registry.register("css", CacheConfig::bounded(8, 0)).insert("site.css", vec![0; 100]);
    html.clear();
    monitor.tick().unwrap();
    assert_eq!(sink.value("CacheCount", "html"), Some(0));
    assert_eq!(sink.value("CacheSize", "css"), Some(108));
    monitor.shutdown();
}

#[test]
fn test_unregistered_cache_is_no_longer_enumerated() {
    let registry = CacheRegistry::new();
    registry.register("a", CacheConfig::default());
    registry.register("b", CacheConfig::default());
    assert!(registry.unregister("a").is_some());
    let names: Vec<String> = registry.enumerate().unwrap().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["b".to_string()]);
}
