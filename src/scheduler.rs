//! Fixed-delay background runner.
//!
//! The delay is measured from the end of one run to the start of the next, so runs
//! never overlap no matter how slow a run is.

use crate::diag;
use crate::errors::CounterError;
use log::Level;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Whether the scheduler should keep going after a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Halt,
}

/// Work driven by a [`Scheduler`].
pub trait Job: Send + 'static {
    fn run_once(&mut self) -> Tick;

    /// Delay before the next run, read after each run completes.
    fn next_delay(&self) -> Duration;
}

/// Owns the worker thread of one periodic job.
pub struct Scheduler {
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Run `job` once on the calling thread, then keep running it on a thread named `name`.
    ///
    /// # Errors
    /// Returns `Scheduler` if the worker thread cannot be spawned.
    pub fn start<J: Job>(name: &str, mut job: J) -> Result<Self, CounterError> {
        if run_guarded(&mut job) == Tick::Halt {
            return Ok(Self { stop_tx: None, worker: None });
        }
        let (tx, rx) = mpsc::channel::<()>();
        let worker = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                loop {
                    match rx.recv_timeout(job.next_delay()) {
                        Err(RecvTimeoutError::Timeout) => {}
                        // stop requested, or the scheduler itself is gone
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if run_guarded(&mut job) == Tick::Halt {
                        break;
                    }
                }
                log::debug!("scheduler worker exiting");
            })
            .map_err(|e| CounterError::Scheduler(format!("spawn {name}: {e}")))?;
        Ok(Self { stop_tx: Some(tx), worker: Some(worker) })
    }

    /// Prevent any further runs. An in-flight run is left to finish. Idempotent.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Stop, then wait for the worker to exit. A no-op when called from the worker itself.
    pub fn join(&mut self) {
        self.stop();
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                log::error!("scheduler worker panicked");
            }
        }
    }

    /// Whether the worker thread is still alive.
    pub fn is_active(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_guarded<J: Job>(job: &mut J) -> Tick {
    catch_unwind(AssertUnwindSafe(|| job.run_once())).unwrap_or_else(|_| {
        diag!(Level::Error, "scheduled run panicked; continuing with next tick");
        Tick::Continue
    })
}
