//! Periodically publishes the item count, byte size and maximum byte size of in-process
//! caches to a named-counter sink, one counter instance per cache.
//!
//! ```no_run
//! use cachecounters::cache::{CacheConfig, CacheRegistry};
//! use cachecounters::config::SamplingConfig;
//! use cachecounters::monitor::CacheMonitor;
//! use cachecounters::sink::MemorySink;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(CacheRegistry::new());
//! registry.register("html", CacheConfig::bounded(1024, 8 * 1024 * 1024));
//! let sink = Arc::new(MemorySink::with_cache_counters());
//! let monitor = CacheMonitor::new(sink, registry, SamplingConfig::default()).unwrap();
//! let _ = monitor.initialize();
//! ```

pub mod cache;
pub mod config;
pub mod diag;
pub mod errors;
pub mod handles;
pub mod logger;
pub mod monitor;
pub mod sampler;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod types;

mod test_support;

pub use config::SamplingConfig;
pub use errors::CounterError;
pub use monitor::CacheMonitor;
pub use source::CacheSnapshotSource;
pub use types::{CATEGORY, CacheStat, DisableReason, LifecycleState, MetricKind};
