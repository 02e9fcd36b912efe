mod config;
mod core;
mod metrics;
mod policy;
mod registry;
mod size;

pub use config::CacheConfig;
pub use core::Cache;
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use registry::CacheRegistry;
