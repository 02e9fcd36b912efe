//! Named-counter backends that samples are published to.
//!
//! A sink is organised as `category -> counter -> instance`. Categories and counter
//! definitions are provisioned by an operator ahead of time; this crate only ever opens
//! instances inside an existing category.

mod facade;
mod memory;

pub use facade::{FacadeCounter, MetricsFacadeSink};
pub use memory::{MemoryCounter, MemorySink, WriteEvent};

use crate::errors::CounterError;

/// A reusable reference to one counter instance.
pub trait CounterHandle: Send {
    /// Set the counter's current raw value.
    fn set_value(&self, value: u64) -> Result<(), CounterError>;
}

/// An opaque, pre-provisioned named-counter store.
pub trait MetricSink: Send + Sync {
    type Handle: CounterHandle;

    /// Whether `category` has been provisioned.
    ///
    /// `Ok(false)` means "not provisioned"; `Err` means the check itself could not be made.
    fn category_exists(&self, category: &str) -> Result<bool, CounterError>;

    /// Open (creating the instance if needed) the counter `counter` for `instance`.
    /// Opening is comparatively expensive; callers are expected to reuse handles.
    fn open_counter(
        &self,
        category: &str,
        counter: &str,
        instance: &str,
    ) -> Result<Self::Handle, CounterError>;
}
