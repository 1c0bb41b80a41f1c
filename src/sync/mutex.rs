//! `FutexMutex`: a three-state exclusive lock.

use super::{wait_on_u32, wake_one_u32};
use crate::policy::RawMutex;
use core::sync::atomic::{AtomicU32, Ordering};

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const CONTENDED: u32 = 2;

/// Attempts made by spinning before a thread parks.
const SPIN_LIMIT: u32 = 40;

/// An exclusive lock that parks contended threads on the OS wait-address
/// facility (futex on Linux, `WaitOnAddress` on Windows).
///
/// This is the default backend of [`Primitive`](crate::Primitive).
pub struct FutexMutex {
    /// 0: unlocked, 1: locked, 2: locked & contended
    state: AtomicU32,
}

impl FutexMutex {
    /// Creates a new, unlocked mutex.
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(UNLOCKED),
        }
    }

    /// Acquires the mutex, blocking the current thread until it is able to do so.
    #[inline]
    pub fn lock(&self) {
        if self
            .state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.lock_slow();
        }
    }

    /// Attempts to acquire the mutex without blocking.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[cold]
    fn lock_slow(&self) {
        let mut state = self.state.load(Ordering::Relaxed);
        for _ in 0..SPIN_LIMIT {
            if state == UNLOCKED {
                match self.state.compare_exchange_weak(
                    UNLOCKED,
                    LOCKED,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => return,
                    Err(s) => state = s,
                }
                continue;
            }
            core::hint::spin_loop();
            state = self.state.load(Ordering::Relaxed);
        }

        trace_event!(trace, "futex mutex: parking");
        // Once a thread has waited it can no longer tell whether others are
        // waiting too, so it always takes the lock in the contended state.
        while self.state.swap(CONTENDED, Ordering::Acquire) != UNLOCKED {
            wait_on_u32(&self.state, CONTENDED);
        }
    }

    /// Unlocks the mutex, waking one waiter if the lock was contended.
    ///
    /// # Safety
    ///
    /// This must only be called by the thread that currently holds the lock.
    #[inline]
    pub unsafe fn unlock(&self) {
        if self.state.swap(UNLOCKED, Ordering::Release) == CONTENDED {
            wake_one_u32(&self.state);
        }
    }

    /// Returns `true` if the mutex is currently held.
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != UNLOCKED
    }
}

impl Default for FutexMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for FutexMutex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FutexMutex")
            .field("locked", &self.is_locked())
            .finish()
    }
}

// SAFETY: LOCKED/CONTENDED are only entered from UNLOCKED by one successful
// compare-exchange or swap at a time.
unsafe impl RawMutex for FutexMutex {
    #[inline]
    fn lock(&self) {
        FutexMutex::lock(self);
    }

    #[inline]
    fn try_lock(&self) -> bool {
        FutexMutex::try_lock(self)
    }

    #[inline]
    unsafe fn unlock(&self) {
        FutexMutex::unlock(self);
    }
}
