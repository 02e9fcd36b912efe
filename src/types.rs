use serde::{Deserialize, Serialize};
use std::fmt;

/// Counter category every cache counter lives under.
pub const CATEGORY: &str = "CacheCounters";

pub type CacheName = String;

/// Point-in-time view of one registered cache.
///
/// Produced fresh on every enumeration; nothing holds on to it past one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStat {
    /// Unique per cache, doubles as the counter instance name.
    pub name: CacheName,
    pub count: u64,
    /// Current size in bytes.
    pub size: u64,
    /// Configured maximum size in bytes. `0` means unbounded.
    pub max_size: u64,
}

impl CacheStat {
    pub fn new(name: impl Into<CacheName>, count: u64, size: u64, max_size: u64) -> Self {
        Self { name: name.into(), count, size, max_size }
    }
}

/// The observable facets of a cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    Count,
    Size,
    MaxSize,
}

impl MetricKind {
    /// All kinds, in the order a pass writes them.
    pub const ALL: [MetricKind; 3] = [MetricKind::Count, MetricKind::Size, MetricKind::MaxSize];

    /// Name of the counter this kind is published under.
    pub fn counter_name(self) -> &'static str {
        match self {
            MetricKind::Count => "CacheCount",
            MetricKind::Size => "CacheSize",
            MetricKind::MaxSize => "CacheMaxSize",
        }
    }

    pub fn value_of(self, stat: &CacheStat) -> u64 {
        match self {
            MetricKind::Count => stat.count,
            MetricKind::Size => stat.size,
            MetricKind::MaxSize => stat.max_size,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.counter_name())
    }
}

/// Identifies one resolved counter handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleKey {
    pub metric: String,
    pub instance: String,
}

impl HandleKey {
    pub fn new(metric: &str, instance: &str) -> Self {
        Self { metric: metric.to_owned(), instance: instance.to_owned() }
    }
}

impl fmt::Display for HandleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.metric, self.instance)
    }
}

/// Why a monitor stopped publishing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisableReason {
    /// The counter category was not provisioned.
    CategoryMissing,
    /// Checking the sink or starting the scheduler failed.
    InitFailed,
    /// `stop()` was called.
    Stopped,
}

impl fmt::Display for DisableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DisableReason::CategoryMissing => "counter category missing",
            DisableReason::InitFailed => "initialization failed",
            DisableReason::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Running,
    /// Terminal until the monitor is initialized again.
    Disabled(DisableReason),
}

impl LifecycleState {
    pub fn is_running(self) -> bool {
        matches!(self, LifecycleState::Running)
    }
}
