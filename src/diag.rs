//! Lifecycle diagnostics with a thread-local capture sink for deterministic tests.
//! Everything logged through `diag!` also goes to the global `log` facade.

use log::Level;
use std::cell::RefCell;

thread_local! {
    static TL_SINK: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Guard that disables the thread-local sink on drop.
pub struct DiagSinkGuard;
impl Drop for DiagSinkGuard {
    fn drop(&mut self) {
        TL_SINK.with(|s| *s.borrow_mut() = None);
    }
}

/// Enable the thread-local sink for the current thread. Returns a guard that will disable it on drop.
pub fn enable_thread_sink() -> DiagSinkGuard {
    TL_SINK.with(|s| *s.borrow_mut() = Some(Vec::new()));
    DiagSinkGuard
}

/// Record a message as `LEVEL: message` if the sink is enabled on this thread.
pub fn capture(level: Level, msg: &str) {
    TL_SINK.with(|s| {
        if let Some(buf) = s.borrow_mut().as_mut() {
            buf.push(format!("{level}: {msg}"));
        }
    });
}

/// Drain and return the captured messages for the current thread. If disabled, returns an empty vec.
pub fn drain() -> Vec<String> {
    TL_SINK.with(|s| match s.borrow_mut().as_mut() {
        Some(buf) => std::mem::take(buf),
        None => Vec::new(),
    })
}

/// Number of captured messages at `level` without clearing them.
pub fn count(level: Level) -> usize {
    let prefix = format!("{level}: ");
    TL_SINK.with(|s| {
        s.borrow().as_ref().map_or(0, |buf| buf.iter().filter(|m| m.starts_with(&prefix)).count())
    })
}

/// Log through `log` at the given level and capture the message in the thread-local sink if enabled.
#[macro_export]
macro_rules! diag {
    ($lvl:expr, $($arg:tt)*) => {{
        let __s = format!($($arg)*);
        $crate::diag::capture($lvl, &__s);
        log::log!($lvl, "{}", __s);
    }};
}
