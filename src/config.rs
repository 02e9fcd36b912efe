//! Sampling and logging configuration.
//!
//! Precedence when loading: explicit path > `CACHECOUNTERS_CONFIG` > `./cachecounters.toml`
//! > defaults, then `CACHECOUNTERS_*` environment overrides on top.

use crate::errors::CounterError;
use crate::types::MetricKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INTERVAL_MILLIS: u64 = 1000;

/// Which metric kinds are published and how often.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub sample_count: bool,
    pub sample_size: bool,
    pub sample_max_size: bool,
    /// Delay between the end of one pass and the start of the next.
    pub interval_millis: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_count: true,
            sample_size: true,
            sample_max_size: true,
            interval_millis: DEFAULT_INTERVAL_MILLIS,
        }
    }
}

impl SamplingConfig {
    /// A config with every kind disabled.
    pub fn none(interval_millis: u64) -> Self {
        Self { sample_count: false, sample_size: false, sample_max_size: false, interval_millis }
    }

    /// A config publishing only `kind`.
    pub fn only(kind: MetricKind, interval_millis: u64) -> Self {
        let mut cfg = Self::none(interval_millis);
        cfg.set_enabled(kind, true);
        cfg
    }

    pub fn is_enabled(&self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Count => self.sample_count,
            MetricKind::Size => self.sample_size,
            MetricKind::MaxSize => self.sample_max_size,
        }
    }

    pub fn set_enabled(&mut self, kind: MetricKind, enabled: bool) {
        match kind {
            MetricKind::Count => self.sample_count = enabled,
            MetricKind::Size => self.sample_size = enabled,
            MetricKind::MaxSize => self.sample_max_size = enabled,
        }
    }

    /// Enabled kinds in write order.
    pub fn enabled_kinds(&self) -> impl Iterator<Item = MetricKind> + '_ {
        MetricKind::ALL.into_iter().filter(|k| self.is_enabled(*k))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_millis)
    }

    /// # Errors
    /// Returns `InvalidConfig` if the interval is zero.
    pub fn validate(&self) -> Result<(), CounterError> {
        if self.interval_millis == 0 {
            return Err(CounterError::InvalidConfig("interval_millis must be positive".into()));
        }
        Ok(())
    }

    /// Apply `CACHECOUNTERS_SAMPLE_*` and `CACHECOUNTERS_INTERVAL_MS` overrides.
    ///
    /// # Errors
    /// Returns `InvalidConfig` when a variable is set but unparsable.
    pub fn apply_env(&mut self) -> Result<(), CounterError> {
        for (var, kind) in [
            ("CACHECOUNTERS_SAMPLE_COUNT", MetricKind::Count),
            ("CACHECOUNTERS_SAMPLE_SIZE", MetricKind::Size),
            ("CACHECOUNTERS_SAMPLE_MAX_SIZE", MetricKind::MaxSize),
        ] {
            if let Ok(s) = std::env::var(var) {
                self.set_enabled(kind, parse_flag(var, &s)?);
            }
        }
        if let Ok(s) = std::env::var("CACHECOUNTERS_INTERVAL_MS") {
            self.interval_millis = s
                .trim()
                .parse::<u64>()
                .map_err(|e| CounterError::InvalidConfig(format!("CACHECOUNTERS_INTERVAL_MS: {e}")))?;
        }
        Ok(())
    }
}

fn parse_flag(var: &str, s: &str) -> Result<bool, CounterError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CounterError::InvalidConfig(format!("{var}: not a boolean: {other:?}"))),
    }
}

/// Where and how verbosely to log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
    /// error|warn|info|debug|trace
    pub level: Option<String>,
    pub retention: Option<usize>,
}

/// Full host configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MonitorConfig {
    pub sampling: SamplingConfig,
    pub logging: LoggingConfig,
}

impl MonitorConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    /// Returns an error on malformed TOML or an invalid sampling section.
    pub fn from_toml_str(s: &str) -> Result<Self, CounterError> {
        let cfg: MonitorConfig = toml::from_str(s)?;
        cfg.sampling.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, CounterError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| CounterError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&s)
    }

    /// Load the first existing config file by precedence, then apply environment overrides.
    ///
    /// # Errors
    /// Returns an error if a found file is malformed or an override is invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CounterError> {
        let mut cfg = match find_config_paths(explicit).into_iter().find(|p| p.exists()) {
            Some(p) => {
                log::debug!("loading config from {}", p.display());
                Self::from_file(&p)?
            }
            None => Self::default(),
        };
        cfg.sampling.apply_env()?;
        if let Ok(dir) = std::env::var("CACHECOUNTERS_LOG_DIR") {
            cfg.logging.dir = Some(PathBuf::from(dir));
        }
        if let Ok(level) = std::env::var("CACHECOUNTERS_LOG_LEVEL") {
            cfg.logging.level = Some(level);
        }
        cfg.sampling.validate()?;
        Ok(cfg)
    }
}

fn find_config_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = vec![];
    if let Some(p) = explicit {
        paths.push(p.to_path_buf());
    }
    if let Ok(p) = std::env::var("CACHECOUNTERS_CONFIG") {
        paths.push(PathBuf::from(p));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join("cachecounters.toml"));
    }
    paths
}
