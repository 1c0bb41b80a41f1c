//! `OneThread`: the policy for values that never leave their thread.

use super::Policy;
use core::cell::Cell;

const WRITE_LOCKED: isize = -1;

/// No synchronization at all.
///
/// `OneThread` is `Send` but not `Sync`, so an `Unlocked<T, OneThread>` can be
/// moved to another thread but never shared between two. What remains to check
/// is overlapping tokens on the owning thread, which a borrow flag does (the
/// same bookkeeping `RefCell` performs); conflicting requests panic.
#[derive(Debug, Default)]
pub struct OneThread {
    /// 0: unlocked, n > 0: n read tokens, -1: one write token
    state: Cell<isize>,
}

impl OneThread {
    /// Creates a new, unlocked policy.
    pub const fn new() -> Self {
        Self { state: Cell::new(0) }
    }

    /// Returns `true` if no token is alive.
    pub fn is_unlocked(&self) -> bool {
        self.state.get() == 0
    }

    /// Returns `true` if at least one read token is alive.
    pub fn is_read_locked(&self) -> bool {
        self.state.get() > 0
    }

    /// Returns `true` if a write token is alive.
    pub fn is_write_locked(&self) -> bool {
        self.state.get() == WRITE_LOCKED
    }
}

// SAFETY: the flag never admits a write token next to any other token.
unsafe impl Policy for OneThread {
    #[inline]
    fn rdlock(&self) {
        let state = self.state.get();
        assert!(state >= 0, "OneThread: read access requested while write access is held");
        self.state.set(state + 1);
    }

    #[inline]
    unsafe fn rdunlock(&self) {
        debug_assert!(self.state.get() > 0);
        self.state.set(self.state.get() - 1);
    }

    #[inline]
    fn wrlock(&self) {
        assert!(
            self.state.get() == 0,
            "OneThread: write access requested while the value is already accessed"
        );
        self.state.set(WRITE_LOCKED);
    }

    #[inline]
    unsafe fn wrunlock(&self) {
        debug_assert!(self.state.get() == WRITE_LOCKED);
        self.state.set(0);
    }

    #[inline]
    unsafe fn rd2wrlock(&self) -> bool {
        if self.state.get() == 1 {
            self.state.set(WRITE_LOCKED);
            true
        } else {
            false
        }
    }

    #[inline]
    unsafe fn wr2rdlock(&self) {
        debug_assert!(self.state.get() == WRITE_LOCKED);
        self.state.set(1);
    }

    #[inline]
    fn rd2wryield(&self) {}
}
