use super::{CounterHandle, MetricSink};
use crate::errors::CounterError;
use crate::types::CATEGORY;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

type InstanceKey = (String, String, String);

/// One recorded `set_value` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEvent {
    pub counter: String,
    pub instance: String,
    pub value: u64,
    pub at: Instant,
}

#[derive(Default)]
struct Inner {
    // category -> provisioned counter names
    categories: RwLock<HashMap<String, HashSet<String>>>,
    instances: RwLock<BTreeMap<InstanceKey, Arc<AtomicU64>>>,
    denied: RwLock<HashSet<(String, String)>>,
    fail_checks: AtomicBool,
    write_delay: RwLock<Duration>,
    open_attempts: AtomicU64,
    writes: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    journal_on: AtomicBool,
    journal: Mutex<Vec<WriteEvent>>,
}

/// In-process counter store with operator-style provisioning and fault injection.
///
/// Cloning shares the same store. Individual writes are only journaled after
/// [`journaled`](Self::journaled); otherwise memory stays bounded by the number of instances.
#[derive(Clone, Default)]
pub struct MemorySink {
    inner: Arc<Inner>,
}

impl MemorySink {
    /// An empty sink with nothing provisioned.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink with the cache counter category and its three counters provisioned.
    pub fn with_cache_counters() -> Self {
        let sink = Self::new();
        sink.provision(CATEGORY, &["CacheCount", "CacheSize", "CacheMaxSize"]);
        sink
    }

    /// Record every successful write in the journal from now on.
    pub fn journaled(self) -> Self {
        self.inner.journal_on.store(true, Ordering::Relaxed);
        self
    }

    /// Define `category` with the given counters, adding to any existing definition.
    pub fn provision(&self, category: &str, counters: &[&str]) {
        let mut cats = self.inner.categories.write();
        let set = cats.entry(category.to_owned()).or_default();
        set.extend(counters.iter().map(|c| (*c).to_owned()));
    }

    /// Remove a category and every instance under it.
    pub fn deprovision(&self, category: &str) {
        self.inner.categories.write().remove(category);
        self.inner.instances.write().retain(|(cat, _, _), _| cat != category);
    }

    /// Make opening `counter` for `instance` fail with `AccessDenied` until [`allow`](Self::allow).
    pub fn deny(&self, counter: &str, instance: &str) {
        self.inner.denied.write().insert((counter.to_owned(), instance.to_owned()));
    }

    pub fn allow(&self, counter: &str, instance: &str) {
        self.inner.denied.write().remove(&(counter.to_owned(), instance.to_owned()));
    }

    /// Make `category_exists` return an error instead of an answer.
    pub fn fail_category_checks(&self, fail: bool) {
        self.inner.fail_checks.store(fail, Ordering::Relaxed);
    }

    /// Delete one instance. Handles already open on it fail their next write.
    pub fn remove_instance(&self, counter: &str, instance: &str) -> bool {
        let key = (CATEGORY.to_owned(), counter.to_owned(), instance.to_owned());
        self.inner.instances.write().remove(&key).is_some()
    }

    /// Sleep this long inside every `set_value`.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.inner.write_delay.write() = delay;
    }

    /// Current value of a cache counter instance, if it has been opened.
    pub fn value(&self, counter: &str, instance: &str) -> Option<u64> {
        self.value_in(CATEGORY, counter, instance)
    }

    pub fn value_in(&self, category: &str, counter: &str, instance: &str) -> Option<u64> {
        let key = (category.to_owned(), counter.to_owned(), instance.to_owned());
        self.inner.instances.read().get(&key).map(|v| v.load(Ordering::Relaxed))
    }

    /// All opened instances as `category/counter/instance -> value`.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.inner
            .instances
            .read()
            .iter()
            .map(|((cat, counter, inst), v)| (format!("{cat}/{counter}/{inst}"), v.load(Ordering::Relaxed)))
            .collect()
    }

    /// Number of `open_counter` calls, successful or not.
    pub fn open_attempts(&self) -> u64 {
        self.inner.open_attempts.load(Ordering::Relaxed)
    }

    /// Number of successful `set_value` calls.
    pub fn writes(&self) -> u64 {
        self.inner.writes.load(Ordering::Relaxed)
    }

    /// Highest number of `set_value` calls observed running at the same time.
    pub fn max_concurrent_writes(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::Relaxed)
    }

    /// Journaled writes, oldest first. Empty unless the sink is [`journaled`](Self::journaled).
    pub fn journal(&self) -> Vec<WriteEvent> {
        self.inner.journal.lock().clone()
    }

    /// Journal entries for one counter instance, oldest first.
    pub fn writes_for(&self, counter: &str, instance: &str) -> Vec<u64> {
        self.inner
            .journal
            .lock()
            .iter()
            .filter(|e| e.counter == counter && e.instance == instance)
            .map(|e| e.value)
            .collect()
    }
}

impl MetricSink for MemorySink {
    type Handle = MemoryCounter;

    fn category_exists(&self, category: &str) -> Result<bool, CounterError> {
        if self.inner.fail_checks.load(Ordering::Relaxed) {
            return Err(CounterError::Sink(format!("cannot query category {category}")));
        }
        Ok(self.inner.categories.read().contains_key(category))
    }

    fn open_counter(
        &self,
        category: &str,
        counter: &str,
        instance: &str,
    ) -> Result<MemoryCounter, CounterError> {
        self.inner.open_attempts.fetch_add(1, Ordering::Relaxed);
        {
            let cats = self.inner.categories.read();
            let counters =
                cats.get(category).ok_or_else(|| CounterError::NoSuchCategory(category.to_owned()))?;
            if !counters.contains(counter) {
                return Err(CounterError::NoSuchCounter {
                    category: category.to_owned(),
                    counter: counter.to_owned(),
                });
            }
        }
        if self.inner.denied.read().contains(&(counter.to_owned(), instance.to_owned())) {
            return Err(CounterError::AccessDenied(format!("{counter}/{instance}")));
        }
        let key = (category.to_owned(), counter.to_owned(), instance.to_owned());
        let value = self.inner.instances.write().entry(key.clone()).or_default().clone();
        Ok(MemoryCounter { inner: self.inner.clone(), key, value })
    }
}

/// Handle to one [`MemorySink`] instance.
pub struct MemoryCounter {
    inner: Arc<Inner>,
    key: InstanceKey,
    value: Arc<AtomicU64>,
}

impl CounterHandle for MemoryCounter {
    fn set_value(&self, value: u64) -> Result<(), CounterError> {
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.write(value);
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl MemoryCounter {
    fn write(&self, value: u64) -> Result<(), CounterError> {
        let delay = *self.inner.write_delay.read();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let live = self.inner.instances.read().get(&self.key).is_some_and(|v| Arc::ptr_eq(v, &self.value));
        if !live {
            return Err(CounterError::Sink(format!("instance {}/{} was removed", self.key.1, self.key.2)));
        }
        self.value.store(value, Ordering::Relaxed);
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        if self.inner.journal_on.load(Ordering::Relaxed) {
            self.inner.journal.lock().push(WriteEvent {
                counter: self.key.1.clone(),
                instance: self.key.2.clone(),
                value,
                at: Instant::now(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprovisioned_category_cannot_be_opened() {
        let sink = MemorySink::new();
        assert!(!sink.category_exists(CATEGORY).unwrap());
        let err = sink.open_counter(CATEGORY, "CacheCount", "html").err().unwrap();
        assert!(matches!(err, CounterError::NoSuchCategory(_)));
        assert_eq!(sink.open_attempts(), 1);
    }

    #[test]
    fn unknown_counter_is_rejected() {
        let sink = MemorySink::with_cache_counters();
        let err = sink.open_counter(CATEGORY, "CacheHits", "html").err().unwrap();
        assert!(matches!(err, CounterError::NoSuchCounter { .. }));
    }

    #[test]
    fn denied_instances_fail_until_allowed() {
        let sink = MemorySink::with_cache_counters();
        sink.deny("CacheSize", "html");
        assert!(matches!(
            sink.open_counter(CATEGORY, "CacheSize", "html"),
            Err(CounterError::AccessDenied(_))
        ));
        assert!(sink.open_counter(CATEGORY, "CacheCount", "html").is_ok());
        sink.allow("CacheSize", "html");
        assert!(sink.open_counter(CATEGORY, "CacheSize", "html").is_ok());
    }

    #[test]
    fn writes_are_visible_and_journaled() {
        let sink = MemorySink::with_cache_counters().journaled();
        let h = sink.open_counter(CATEGORY, "CacheCount", "html").unwrap();
        h.set_value(3).unwrap();
        h.set_value(5).unwrap();
        assert_eq!(sink.value("CacheCount", "html"), Some(5));
        assert_eq!(sink.writes_for("CacheCount", "html"), vec![3, 5]);
        assert_eq!(sink.writes(), 2);
        assert_eq!(sink.snapshot().get("CacheCounters/CacheCount/html"), Some(&5));
    }

    #[test]
    fn journal_stays_empty_unless_enabled() {
        let sink = MemorySink::with_cache_counters();
        let h = sink.open_counter(CATEGORY, "CacheCount", "html").unwrap();
        for v in 0..10_000 {
            h.set_value(v).unwrap();
        }
        assert_eq!(sink.writes(), 10_000);
        assert_eq!(sink.value("CacheCount", "html"), Some(9_999));
        assert!(sink.journal().is_empty());
        assert!(sink.writes_for("CacheCount", "html").is_empty());
    }

    #[test]
    fn removed_instance_breaks_open_handles() {
        let sink = MemorySink::with_cache_counters();
        let h = sink.open_counter(CATEGORY, "CacheCount", "html").unwrap();
        assert!(sink.remove_instance("CacheCount", "html"));
        assert!(h.set_value(1).is_err());
        let reopened = sink.open_counter(CATEGORY, "CacheCount", "html").unwrap();
        assert!(reopened.set_value(1).is_ok());
    }

    #[test]
    fn failing_checks_surface_as_errors() {
        let sink = MemorySink::with_cache_counters();
        sink.fail_category_checks(true);
        assert!(sink.category_exists(CATEGORY).is_err());
    }
}
