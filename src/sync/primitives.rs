//! Atomics and spin helpers, swapped for loom's instrumented versions under
//! `--cfg loom`.

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicU32, Ordering};

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicU32, Ordering};

#[cfg(not(loom))]
use crossbeam_utils::Backoff;

/// Spin-then-yield helper for busy-wait loops.
///
/// Outside loom this is `crossbeam_utils::Backoff`: exponential spinning,
/// then `thread::yield_now` once the spin budget is exhausted. Under loom every
/// step yields to the model scheduler.
pub(crate) struct Spin {
    #[cfg(not(loom))]
    backoff: Backoff,
}

impl Spin {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            #[cfg(not(loom))]
            backoff: Backoff::new(),
        }
    }

    /// Waits a little before the caller re-checks the lock state.
    #[inline]
    pub(crate) fn snooze(&self) {
        #[cfg(not(loom))]
        self.backoff.snooze();
        #[cfg(loom)]
        loom::thread::yield_now();
    }
}
