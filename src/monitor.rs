//! Host-facing entry point: checks that the counter category is provisioned, then keeps
//! cache counters published on a background thread until stopped.
//!
//! Nothing in here propagates a failure to the host. A missing category, a sink that
//! cannot be queried or a scheduler that will not start all end in
//! [`LifecycleState::Disabled`].

use crate::config::SamplingConfig;
use crate::diag;
use crate::errors::CounterError;
use crate::sampler::{PassReport, Sampler};
use crate::scheduler::{Job, Scheduler, Tick};
use crate::sink::MetricSink;
use crate::source::CacheSnapshotSource;
use crate::types::{CATEGORY, DisableReason, LifecycleState};
use log::Level;
use parking_lot::{Mutex, RwLock};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const WORKER_NAME: &str = "cachecounters-sampler";

struct Shared<S: MetricSink, C> {
    sink: Arc<S>,
    source: Arc<C>,
    config: RwLock<SamplingConfig>,
    state: RwLock<LifecycleState>,
    sampler: Mutex<Sampler<S>>,
    passes: AtomicU64,
}

impl<S: MetricSink, C: CacheSnapshotSource> Shared<S, C> {
    fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.write() = state;
    }

    /// One pass, or `None` if not running or the caches could not be enumerated.
    fn run_pass(&self) -> Option<PassReport> {
        // held for the whole pass so manual ticks serialize with scheduled ones
        let mut sampler = self.sampler.lock();
        if !self.state().is_running() {
            return None;
        }
        let config = *self.config.read();
        let caches = match self.source.enumerate() {
            Ok(caches) => caches,
            Err(e) => {
                diag!(Level::Warn, "cache enumeration failed, skipping this pass: {e}");
                return None;
            }
        };
        let report = sampler.run_pass(&caches, &config);
        self.passes.fetch_add(1, Ordering::SeqCst);
        if report.skipped + report.failed > 0 {
            log::debug!(
                "pass over {} caches: {} written, {} skipped, {} failed",
                report.caches,
                report.written,
                report.skipped,
                report.failed
            );
        }
        Some(report)
    }
}

struct SamplingJob<S: MetricSink, C> {
    shared: Arc<Shared<S, C>>,
}

impl<S, C> Job for SamplingJob<S, C>
where
    S: MetricSink + 'static,
    C: CacheSnapshotSource + 'static,
{
    fn run_once(&mut self) -> Tick {
        self.shared.run_pass();
        if self.shared.state().is_running() { Tick::Continue } else { Tick::Halt }
    }

    fn next_delay(&self) -> Duration {
        self.shared.config.read().interval()
    }
}

/// Publishes cache statistics from `C` to `S` every configured interval.
pub struct CacheMonitor<S: MetricSink, C> {
    shared: Arc<Shared<S, C>>,
    // serializes initialize calls; never held by stop
    starting: Mutex<()>,
    scheduler: Mutex<Option<Scheduler>>,
}

impl<S, C> CacheMonitor<S, C>
where
    S: MetricSink + 'static,
    C: CacheSnapshotSource + 'static,
{
    /// # Errors
    /// Returns `InvalidConfig` if `config` does not validate.
    pub fn new(sink: Arc<S>, source: Arc<C>, config: SamplingConfig) -> Result<Self, CounterError> {
        config.validate()?;
        let shared = Shared {
            sampler: Mutex::new(Sampler::new(sink.clone())),
            sink,
            source,
            config: RwLock::new(config),
            state: RwLock::new(LifecycleState::Uninitialized),
            passes: AtomicU64::new(0),
        };
        Ok(Self { shared: Arc::new(shared), starting: Mutex::new(()), scheduler: Mutex::new(None) })
    }

    /// Verify the counter category and start publishing.
    ///
    /// The first pass runs before this returns. Calling it while running is a no-op;
    /// calling it while disabled tries again from scratch. If [`stop`](Self::stop) is
    /// called while the first pass runs, this returns `Err(DisableReason::Stopped)`.
    pub fn initialize(&self) -> Result<(), DisableReason> {
        let _starting = self.starting.lock();
        if self.shared.state().is_running() {
            return Ok(());
        }
        let started = catch_unwind(AssertUnwindSafe(|| self.try_start()));
        match started {
            Ok(Ok(Some(scheduler))) => self.install(scheduler),
            Ok(Ok(None)) => {
                diag!(
                    Level::Warn,
                    "counter category {CATEGORY} does not exist; cache counters are disabled"
                );
                self.disable(DisableReason::CategoryMissing)
            }
            Ok(Err(e)) => {
                diag!(Level::Error, "cache counters failed to start: {e}");
                self.disable(DisableReason::InitFailed)
            }
            Err(_) => {
                diag!(Level::Error, "cache counters panicked while starting");
                self.disable(DisableReason::InitFailed)
            }
        }
    }

    /// `None` when the category is not provisioned. Runs the eager pass without
    /// holding the scheduler slot, so `stop` stays callable meanwhile.
    fn try_start(&self) -> Result<Option<Scheduler>, CounterError> {
        if !self.shared.sink.category_exists(CATEGORY)? {
            return Ok(None);
        }
        self.shared.set_state(LifecycleState::Running);
        let job = SamplingJob { shared: self.shared.clone() };
        Scheduler::start(WORKER_NAME, job).map(Some)
    }

    fn install(&self, mut scheduler: Scheduler) -> Result<(), DisableReason> {
        let mut slot = self.scheduler.lock();
        match self.shared.state() {
            LifecycleState::Running => {
                *slot = Some(scheduler);
                log::info!(
                    "cache counters running every {} ms",
                    self.shared.config.read().interval_millis
                );
                Ok(())
            }
            LifecycleState::Disabled(reason) => {
                scheduler.stop();
                Err(reason)
            }
            LifecycleState::Uninitialized => {
                scheduler.stop();
                Err(DisableReason::InitFailed)
            }
        }
    }

    fn disable(&self, reason: DisableReason) -> Result<(), DisableReason> {
        let mut slot = self.scheduler.lock();
        self.shared.set_state(LifecycleState::Disabled(reason));
        if let Some(mut scheduler) = slot.take() {
            scheduler.stop();
        }
        Err(reason)
    }

    /// Stop publishing. A pass already running finishes; no further pass starts.
    pub fn stop(&self) {
        let mut slot = self.scheduler.lock();
        if !matches!(self.shared.state(), LifecycleState::Disabled(_)) {
            self.shared.set_state(LifecycleState::Disabled(DisableReason::Stopped));
        }
        if let Some(mut scheduler) = slot.take() {
            scheduler.stop();
        }
    }

    /// Like [`stop`](Self::stop), but also waits for an in-flight pass to finish.
    pub fn shutdown(&self) {
        let taken = {
            let mut slot = self.scheduler.lock();
            if !matches!(self.shared.state(), LifecycleState::Disabled(_)) {
                self.shared.set_state(LifecycleState::Disabled(DisableReason::Stopped));
            }
            slot.take()
        };
        if let Some(mut scheduler) = taken {
            scheduler.join();
        }
    }

    /// Run one pass now, exactly as a scheduled tick would.
    pub fn tick(&self) -> Option<PassReport> {
        self.shared.run_pass()
    }

    /// Swap in a new configuration. The pass in progress keeps the old one.
    ///
    /// # Errors
    /// Returns `InvalidConfig` and keeps the current configuration if `config` does not validate.
    pub fn replace_config(&self, config: SamplingConfig) -> Result<(), CounterError> {
        config.validate()?;
        *self.shared.config.write() = config;
        log::info!("sampling configuration replaced: {config:?}");
        Ok(())
    }

    pub fn config(&self) -> SamplingConfig {
        *self.shared.config.read()
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.state()
    }

    pub fn passes_completed(&self) -> u64 {
        self.shared.passes.load(Ordering::SeqCst)
    }

    /// Number of cached counter handles.
    pub fn open_handles(&self) -> usize {
        self.shared.sampler.lock().handles().len()
    }
}
