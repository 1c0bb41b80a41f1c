//! `ReadWrite`: shared readers, exclusive writer.

use super::{Policy, RawRwLock};

/// Readers/writer policy over any [`RawRwLock`].
#[derive(Debug, Default)]
pub struct ReadWrite<L> {
    raw: L,
}

impl<L> ReadWrite<L> {
    /// Wraps a raw readers/writer lock.
    pub const fn new(raw: L) -> Self {
        Self { raw }
    }

    /// Returns the underlying lock.
    pub fn raw(&self) -> &L {
        &self.raw
    }
}

// SAFETY: forwards to a `RawRwLock`, whose contract is the policy contract.
unsafe impl<L: RawRwLock> Policy for ReadWrite<L> {
    #[inline]
    fn rdlock(&self) {
        self.raw.rdlock();
    }

    #[inline]
    unsafe fn rdunlock(&self) {
        self.raw.rdunlock();
    }

    #[inline]
    fn wrlock(&self) {
        self.raw.wrlock();
    }

    #[inline]
    unsafe fn wrunlock(&self) {
        self.raw.wrunlock();
    }

    #[inline]
    unsafe fn rd2wrlock(&self) -> bool {
        self.raw.rd2wrlock()
    }

    #[inline]
    unsafe fn wr2rdlock(&self) {
        self.raw.wr2rdlock();
    }

    #[inline]
    fn rd2wryield(&self) {
        self.raw.rd2wryield();
    }
}
