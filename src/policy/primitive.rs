//! `Primitive`: every token maps onto one exclusive lock.

use super::{Policy, RawMutex};

/// Exclusive-only policy over any [`RawMutex`].
///
/// Read and write tokens both take the same lock, so readers never run
/// concurrently. Upgrading a read token always succeeds (it already excludes
/// everyone) and downgrading is a no-op.
#[derive(Debug, Default)]
pub struct Primitive<M> {
    raw: M,
}

impl<M> Primitive<M> {
    /// Wraps a raw mutex.
    pub const fn new(raw: M) -> Self {
        Self { raw }
    }

    /// Returns the underlying mutex.
    pub fn raw(&self) -> &M {
        &self.raw
    }
}

// SAFETY: every token holds the one exclusive lock.
unsafe impl<M: RawMutex> Policy for Primitive<M> {
    #[inline]
    fn rdlock(&self) {
        self.raw.lock();
    }

    #[inline]
    unsafe fn rdunlock(&self) {
        self.raw.unlock();
    }

    #[inline]
    fn wrlock(&self) {
        self.raw.lock();
    }

    #[inline]
    unsafe fn wrunlock(&self) {
        self.raw.unlock();
    }

    #[inline]
    unsafe fn rd2wrlock(&self) -> bool {
        true
    }

    #[inline]
    unsafe fn wr2rdlock(&self) {}

    #[inline]
    fn rd2wryield(&self) {}
}
