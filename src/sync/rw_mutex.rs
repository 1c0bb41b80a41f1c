//! `ReadWriteMutex`: a parking readers/writer lock.
//!
//! Shares the lock protocol of [`ReadWriteSpinLock`] (writer priority,
//! non-waiting upgrade, failure-free downgrade) but parks threads that cannot
//! make progress after a short spin. Parking uses an event counter: every
//! release bumps `epoch`, and a parked thread sleeps only while `epoch` still
//! holds the value it read before its last failed attempt.

use super::{wait_on_u32, wake_all_u32, ReadWriteSpinLock};
use crate::policy::{RawMutex, RawRwLock};
use core::sync::atomic::{AtomicU32, Ordering};

/// Attempts made by spinning before a thread parks.
const SPIN_LIMIT: u32 = 64;

/// A blocking read-write mutex: N concurrent readers XOR one writer.
pub struct ReadWriteMutex {
    lock: ReadWriteSpinLock,
    epoch: AtomicU32,
    parked: AtomicU32,
}

impl ReadWriteMutex {
    /// Creates a new, unlocked mutex.
    #[cfg(not(loom))]
    #[inline]
    pub const fn new() -> Self {
        Self {
            lock: ReadWriteSpinLock::new(),
            epoch: AtomicU32::new(0),
            parked: AtomicU32::new(0),
        }
    }

    /// Creates a new, unlocked mutex.
    #[cfg(loom)]
    pub fn new() -> Self {
        Self {
            lock: ReadWriteSpinLock::new(),
            epoch: AtomicU32::new(0),
            parked: AtomicU32::new(0),
        }
    }

    /// Runs `attempt` until it succeeds, parking between attempts once the
    /// spin budget is spent.
    fn block_on(&self, mut attempt: impl FnMut() -> bool) {
        for _ in 0..SPIN_LIMIT {
            if attempt() {
                return;
            }
            core::hint::spin_loop();
        }

        trace_event!(trace, "read-write mutex: parking");
        loop {
            self.parked.fetch_add(1, Ordering::SeqCst);
            let epoch = self.epoch.load(Ordering::SeqCst);
            if attempt() {
                self.parked.fetch_sub(1, Ordering::SeqCst);
                return;
            }
            wait_on_u32(&self.epoch, epoch);
            self.parked.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Publishes a release to parked threads.
    #[inline]
    fn notify(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if self.parked.load(Ordering::SeqCst) != 0 {
            wake_all_u32(&self.epoch);
        }
    }

    /// Acquires a shared read lock, parking while writers hold or wait for it.
    pub fn rdlock(&self) {
        if !self.lock.try_rdlock() {
            self.block_on(|| self.lock.try_rdlock());
        }
    }

    /// Attempts to acquire a shared read lock without waiting.
    #[inline]
    pub fn try_rdlock(&self) -> bool {
        self.lock.try_rdlock()
    }

    /// Releases a shared read lock.
    ///
    /// # Safety
    ///
    /// The caller must hold a read lock on `self`.
    pub unsafe fn rdunlock(&self) {
        self.lock.rdunlock();
        self.notify();
    }

    /// Acquires the exclusive write lock.
    pub fn wrlock(&self) {
        if self.lock.try_wrlock() {
            return;
        }
        if self.lock.register_writer() {
            self.block_on(|| self.lock.try_claim_writer());
        } else {
            self.block_on(|| self.lock.try_wrlock());
        }
    }

    /// Attempts to acquire the write lock without waiting.
    #[inline]
    pub fn try_wrlock(&self) -> bool {
        self.lock.try_wrlock()
    }

    /// Releases the write lock.
    ///
    /// # Safety
    ///
    /// The caller must hold the write lock on `self`.
    pub unsafe fn wrunlock(&self) {
        self.lock.wrunlock();
        self.notify();
    }

    /// Converts the caller's read lock into the write lock. Never waits; see
    /// [`ReadWriteSpinLock::rd2wrlock`] for the failure rule.
    ///
    /// # Safety
    ///
    /// The caller must hold a read lock on `self`.
    pub unsafe fn rd2wrlock(&self) -> bool {
        self.lock.rd2wrlock()
    }

    /// Converts the write lock into a single read lock. Never waits.
    ///
    /// # Safety
    ///
    /// The caller must hold the write lock on `self`.
    pub unsafe fn wr2rdlock(&self) {
        self.lock.wr2rdlock();
        // Readers parked behind the writer may enter now.
        self.notify();
    }

    /// Parks until no writer holds the lock.
    pub fn rd2wryield(&self) {
        self.block_on(|| !self.lock.is_write_locked());
    }

    /// Returns `true` if nobody holds the lock.
    pub fn is_unlocked(&self) -> bool {
        self.lock.is_unlocked()
    }

    /// Returns `true` if at least one read lock is held.
    pub fn is_read_locked(&self) -> bool {
        self.lock.is_read_locked()
    }

    /// Returns `true` if the write lock is held.
    pub fn is_write_locked(&self) -> bool {
        self.lock.is_write_locked()
    }

    /// Number of read locks currently held.
    pub fn reader_count(&self) -> u32 {
        self.lock.reader_count()
    }
}

impl Default for ReadWriteMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for ReadWriteMutex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReadWriteMutex")
            .field("lock", &self.lock)
            .field("parked", &self.parked.load(Ordering::Relaxed))
            .finish()
    }
}

// SAFETY: all lock state transitions are those of `ReadWriteSpinLock`.
unsafe impl RawRwLock for ReadWriteMutex {
    #[inline]
    fn rdlock(&self) {
        ReadWriteMutex::rdlock(self);
    }

    #[inline]
    unsafe fn rdunlock(&self) {
        ReadWriteMutex::rdunlock(self);
    }

    #[inline]
    fn wrlock(&self) {
        ReadWriteMutex::wrlock(self);
    }

    #[inline]
    unsafe fn wrunlock(&self) {
        ReadWriteMutex::wrunlock(self);
    }

    #[inline]
    unsafe fn rd2wrlock(&self) -> bool {
        ReadWriteMutex::rd2wrlock(self)
    }

    #[inline]
    unsafe fn wr2rdlock(&self) {
        ReadWriteMutex::wr2rdlock(self);
    }

    #[inline]
    fn rd2wryield(&self) {
        ReadWriteMutex::rd2wryield(self);
    }
}

// SAFETY: exclusive locking maps onto the write lock.
unsafe impl RawMutex for ReadWriteMutex {
    #[inline]
    fn lock(&self) {
        self.wrlock();
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.try_wrlock()
    }

    #[inline]
    unsafe fn unlock(&self) {
        self.wrunlock();
    }
}
