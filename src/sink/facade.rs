//! Publishes counters through the [`metrics`] facade.
//!
//! Each counter becomes a gauge named `<category>_<counter>` with an `instance` label.
//! Whatever recorder is installed (e.g. the Prometheus exporter) receives the values.

use super::{CounterHandle, MetricSink};
use crate::errors::CounterError;
use metrics::{Gauge, Unit, describe_gauge, gauge};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

pub fn gauge_name(category: &str, counter: &str) -> String {
    format!("{category}_{counter}")
}

/// Sink backed by the global (or thread-local) `metrics` recorder.
#[derive(Default)]
pub struct MetricsFacadeSink {
    categories: RwLock<HashMap<String, HashSet<String>>>,
}

impl MetricsFacadeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `category` and describe its gauges to the current recorder.
    /// Counters whose name ends in `Size` are described in bytes.
    pub fn provision(&self, category: &str, counters: &[&str]) {
        let mut cats = self.categories.write();
        let set = cats.entry(category.to_owned()).or_default();
        for counter in counters {
            let unit = if counter.ends_with("Size") { Unit::Bytes } else { Unit::Count };
            describe_gauge!(gauge_name(category, counter), unit, format!("{category} {counter} per cache instance"));
            set.insert((*counter).to_owned());
        }
    }
}

impl MetricSink for MetricsFacadeSink {
    type Handle = FacadeCounter;

    fn category_exists(&self, category: &str) -> Result<bool, CounterError> {
        Ok(self.categories.read().contains_key(category))
    }

    fn open_counter(
        &self,
        category: &str,
        counter: &str,
        instance: &str,
    ) -> Result<FacadeCounter, CounterError> {
        let cats = self.categories.read();
        let counters =
            cats.get(category).ok_or_else(|| CounterError::NoSuchCategory(category.to_owned()))?;
        if !counters.contains(counter) {
            return Err(CounterError::NoSuchCounter {
                category: category.to_owned(),
                counter: counter.to_owned(),
            });
        }
        let gauge = gauge!(gauge_name(category, counter), "instance" => instance.to_owned());
        Ok(FacadeCounter { gauge })
    }
}

/// A registered gauge.
pub struct FacadeCounter {
    gauge: Gauge,
}

impl CounterHandle for FacadeCounter {
    fn set_value(&self, value: u64) -> Result<(), CounterError> {
        self.gauge.set(value as f64);
        Ok(())
    }
}
