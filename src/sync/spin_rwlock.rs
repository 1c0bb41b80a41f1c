//! `ReadWriteSpinLock`: a busy-waiting readers/writer lock with upgrade and
//! downgrade.
//!
//! The whole lock is one `u32`:
//!
//! ```text
//!  31          30..20             19..0
//! +--------+------------------+--------------+
//! | WRITER | waiting writers  | reader count |
//! +--------+------------------+--------------+
//! ```
//!
//! Fairness: writers win. As soon as a writer is waiting, new readers stay
//! out; readers already inside finish. A reader that re-enters `rdlock` while
//! holding a read lock can therefore deadlock against a waiting writer.
//!
//! An upgrade never waits for other readers: it succeeds only for the sole
//! reader and fails otherwise, leaving the read lock in place.

use super::primitives::{AtomicU32, Ordering, Spin};
use crate::policy::{RawMutex, RawRwLock};

const READER: u32 = 1;
const READER_MASK: u32 = (1 << 20) - 1;
const WRITER_WAITING: u32 = 1 << 20;
const WAITING_MASK: u32 = ((1 << 11) - 1) << 20;
const WRITER: u32 = 1 << 31;

/// Any of these bits keeps new readers out.
const BLOCKS_READERS: u32 = WRITER | WAITING_MASK;
/// Any of these bits keeps a registered writer out.
const BLOCKS_WRITER: u32 = WRITER | READER_MASK;

/// A read-write spinlock: N concurrent readers XOR one writer.
///
/// Waiting never parks the thread; contended paths spin with exponential
/// backoff and then yield the processor. For long critical sections prefer
/// [`ReadWriteMutex`](super::ReadWriteMutex).
///
/// At most 2047 writers are queued with priority at once. Writers beyond that
/// still get the lock, but compete with new readers instead of keeping them
/// out.
pub struct ReadWriteSpinLock {
    state: AtomicU32,
}

impl ReadWriteSpinLock {
    /// Creates a new, unlocked spinlock.
    #[cfg(not(loom))]
    #[inline]
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(0),
        }
    }

    /// Creates a new, unlocked spinlock.
    #[cfg(loom)]
    pub fn new() -> Self {
        Self {
            state: AtomicU32::new(0),
        }
    }

    /// Acquires a shared read lock, spinning while a writer holds the lock or
    /// is waiting for it.
    #[inline]
    pub fn rdlock(&self) {
        if !self.try_rdlock() {
            self.rdlock_slow();
        }
    }

    #[cold]
    fn rdlock_slow(&self) {
        trace_event!(trace, "read-write spinlock: rdlock contended");
        let spin = Spin::new();
        while !self.try_rdlock() {
            spin.snooze();
        }
    }

    /// Attempts to acquire a shared read lock without waiting.
    #[inline]
    pub fn try_rdlock(&self) -> bool {
        let mut state = self.state.load(Ordering::Relaxed);
        while state & BLOCKS_READERS == 0 {
            debug_assert!(state & READER_MASK != READER_MASK, "reader count overflow");
            match self.state.compare_exchange_weak(
                state,
                state + READER,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => state = actual,
            }
        }
        false
    }

    /// Releases a shared read lock.
    ///
    /// # Safety
    ///
    /// The caller must hold a read lock on `self`.
    #[inline]
    pub unsafe fn rdunlock(&self) {
        let prev = self.state.fetch_sub(READER, Ordering::Release);
        debug_assert!(prev & READER_MASK != 0, "rdunlock without a read lock");
    }

    /// Acquires the exclusive write lock, spinning while any reader or writer
    /// holds the lock.
    #[inline]
    pub fn wrlock(&self) {
        if self.try_wrlock() {
            return;
        }
        let spin = Spin::new();
        if self.register_writer() {
            while !self.try_claim_writer() {
                spin.snooze();
            }
        } else {
            while !self.try_wrlock() {
                spin.snooze();
            }
        }
    }

    /// Attempts to acquire the write lock without waiting.
    ///
    /// Fails while any other thread holds or waits for the lock.
    #[inline]
    pub fn try_wrlock(&self) -> bool {
        self.state
            .compare_exchange(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Announces a waiting writer; new readers are refused from here on.
    ///
    /// Returns `false`, registering nothing, when the waiting-writer count is
    /// saturated. The caller then falls back to [`Self::try_wrlock`].
    #[cold]
    pub(crate) fn register_writer(&self) -> bool {
        trace_event!(trace, "read-write spinlock: writer waiting");
        let mut state = self.state.load(Ordering::Relaxed);
        loop {
            if state & WAITING_MASK == WAITING_MASK {
                trace_event!(debug, "read-write spinlock: waiting writers saturated");
                return false;
            }
            match self.state.compare_exchange_weak(
                state,
                state + WRITER_WAITING,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => state = actual,
            }
        }
    }

    /// Turns a registered waiting writer into the lock holder, if the lock is free.
    pub(crate) fn try_claim_writer(&self) -> bool {
        let mut state = self.state.load(Ordering::Relaxed);
        while state & BLOCKS_WRITER == 0 {
            debug_assert!(state & WAITING_MASK != 0);
            match self.state.compare_exchange_weak(
                state,
                (state - WRITER_WAITING) | WRITER,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => state = actual,
            }
        }
        false
    }

    /// Releases the write lock.
    ///
    /// # Safety
    ///
    /// The caller must hold the write lock on `self`.
    #[inline]
    pub unsafe fn wrunlock(&self) {
        let prev = self.state.fetch_sub(WRITER, Ordering::Release);
        debug_assert!(prev & WRITER != 0, "wrunlock without the write lock");
    }

    /// Converts the caller's read lock into the write lock. Never waits.
    ///
    /// Succeeds only while the caller is the sole reader. Returns `false`,
    /// with the read lock still held, when any other read lock exists, even
    /// one held by the calling thread. Waiting writers do not prevent the
    /// upgrade; they keep waiting behind it.
    ///
    /// A caller that gets `false` must release its read lock before trying
    /// again, optionally calling [`Self::rd2wryield`] in between.
    ///
    /// # Safety
    ///
    /// The caller must hold a read lock on `self`.
    pub unsafe fn rd2wrlock(&self) -> bool {
        let mut state = self.state.load(Ordering::Relaxed);
        loop {
            debug_assert!(state & READER_MASK != 0, "rd2wrlock without a read lock");
            if state & READER_MASK != READER {
                trace_event!(debug, "read-write spinlock: upgrade refused, other readers present");
                return false;
            }
            match self.state.compare_exchange_weak(
                state,
                (state - READER) | WRITER,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => state = actual,
            }
        }
    }

    /// Converts the write lock into a single read lock. Never waits.
    ///
    /// # Safety
    ///
    /// The caller must hold the write lock on `self`.
    #[inline]
    pub unsafe fn wr2rdlock(&self) {
        let prev = self.state.fetch_sub(WRITER - READER, Ordering::Release);
        debug_assert!(prev & WRITER != 0, "wr2rdlock without the write lock");
    }

    /// Waits until no writer holds the lock, then backs off once.
    ///
    /// Call this after losing an upgrade and releasing the read lock, so the
    /// retry does not run in lockstep with the other reader.
    pub fn rd2wryield(&self) {
        let spin = Spin::new();
        while self.is_write_locked() {
            spin.snooze();
        }
        spin.snooze();
    }

    /// Returns `true` if nobody holds the lock (waiting writers may exist).
    pub fn is_unlocked(&self) -> bool {
        self.state.load(Ordering::Relaxed) & (WRITER | READER_MASK) == 0
    }

    /// Returns `true` if at least one read lock is held.
    pub fn is_read_locked(&self) -> bool {
        self.reader_count() != 0
    }

    /// Returns `true` if the write lock is held.
    pub fn is_write_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) & WRITER != 0
    }

    /// Number of read locks currently held.
    pub fn reader_count(&self) -> u32 {
        self.state.load(Ordering::Relaxed) & READER_MASK
    }

    /// Number of writers queued with priority over new readers.
    pub fn waiting_writers(&self) -> u32 {
        (self.state.load(Ordering::Relaxed) & WAITING_MASK) >> 20
    }
}

impl Default for ReadWriteSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for ReadWriteSpinLock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.load(Ordering::Relaxed);
        f.debug_struct("ReadWriteSpinLock")
            .field("readers", &(state & READER_MASK))
            .field("waiting_writers", &((state & WAITING_MASK) >> 20))
            .field("writer", &(state & WRITER != 0))
            .finish()
    }
}

// SAFETY: a read lock is only granted while WRITER is clear and WRITER is only
// set while the reader count is zero (or one, for the upgrading reader itself).
unsafe impl RawRwLock for ReadWriteSpinLock {
    #[inline]
    fn rdlock(&self) {
        ReadWriteSpinLock::rdlock(self);
    }

    #[inline]
    unsafe fn rdunlock(&self) {
        ReadWriteSpinLock::rdunlock(self);
    }

    #[inline]
    fn wrlock(&self) {
        ReadWriteSpinLock::wrlock(self);
    }

    #[inline]
    unsafe fn wrunlock(&self) {
        ReadWriteSpinLock::wrunlock(self);
    }

    #[inline]
    unsafe fn rd2wrlock(&self) -> bool {
        ReadWriteSpinLock::rd2wrlock(self)
    }

    #[inline]
    unsafe fn wr2rdlock(&self) {
        ReadWriteSpinLock::wr2rdlock(self);
    }

    #[inline]
    fn rd2wryield(&self) {
        ReadWriteSpinLock::rd2wryield(self);
    }
}

// SAFETY: exclusive locking maps onto the write lock.
unsafe impl RawMutex for ReadWriteSpinLock {
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

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as StdOrdering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_read_then_write() {
        let lock = ReadWriteSpinLock::new();
        lock.rdlock();
        lock.rdlock();
        assert_eq!(lock.reader_count(), 2);
        assert!(!lock.try_wrlock());
        unsafe {
            lock.rdunlock();
            lock.rdunlock();
        }
        assert!(lock.is_unlocked());

        lock.wrlock();
        assert!(lock.is_write_locked());
        assert!(!lock.try_rdlock());
        unsafe { lock.wrunlock() };
        assert!(lock.is_unlocked());
    }

    #[test]
    fn test_sole_reader_upgrades_and_downgrades() {
        let lock = ReadWriteSpinLock::new();
        lock.rdlock();
        assert!(unsafe { lock.rd2wrlock() });
        assert!(lock.is_write_locked());
        assert_eq!(lock.reader_count(), 0);

        unsafe { lock.wr2rdlock() };
        assert!(!lock.is_write_locked());
        assert_eq!(lock.reader_count(), 1);
        unsafe { lock.rdunlock() };
        assert!(lock.is_unlocked());
    }

    #[test]
    fn test_upgrade_refused_while_another_reader_holds() {
        let lock = ReadWriteSpinLock::new();
        lock.rdlock();
        lock.rdlock();
        assert!(!unsafe { lock.rd2wrlock() });
        // Nothing changed: both read locks are still held.
        assert_eq!(lock.reader_count(), 2);
        assert!(!lock.is_write_locked());

        unsafe { lock.rdunlock() };
        assert!(unsafe { lock.rd2wrlock() });
        unsafe { lock.wrunlock() };
        assert!(lock.is_unlocked());
    }

    #[test]
    fn test_upgrade_passes_waiting_writer() {
        let lock = ReadWriteSpinLock::new();
        lock.rdlock();
        assert!(lock.register_writer());
        assert!(!lock.try_rdlock());

        assert!(unsafe { lock.rd2wrlock() });
        assert_eq!(lock.waiting_writers(), 1);
        assert!(!lock.try_claim_writer());

        unsafe { lock.wrunlock() };
        assert!(lock.try_claim_writer());
        assert_eq!(lock.waiting_writers(), 0);
        unsafe { lock.wrunlock() };
        assert!(lock.is_unlocked());
    }

    #[test]
    fn test_saturated_waiting_writers_fall_back() {
        let lock = ReadWriteSpinLock::new();
        lock.state.store(WAITING_MASK | READER, Ordering::Relaxed);
        assert!(!lock.register_writer());
        // The count did not carry into the writer bit.
        assert_eq!(lock.waiting_writers(), WAITING_MASK >> 20);
        assert!(!lock.is_write_locked());
        assert_eq!(lock.reader_count(), 1);

        lock.state.store(0, Ordering::Relaxed);
        assert!(lock.register_writer());
        assert_eq!(lock.waiting_writers(), 1);
    }

    #[test]
    fn test_waiting_writer_blocks_new_readers() {
        let lock = ReadWriteSpinLock::new();
        lock.rdlock();
        let writer_done = AtomicBool::new(false);

        thread::scope(|s| {
            s.spawn(|| {
                lock.wrlock();
                writer_done.store(true, StdOrdering::SeqCst);
                unsafe { lock.wrunlock() };
            });

            // Wait until the writer registered itself.
            while lock.waiting_writers() == 0 {
                thread::yield_now();
            }
            assert!(!lock.try_rdlock(), "a waiting writer must keep new readers out");
            assert!(!writer_done.load(StdOrdering::SeqCst));

            unsafe { lock.rdunlock() };
        });

        assert!(writer_done.load(StdOrdering::SeqCst));
        assert!(lock.is_unlocked());
    }

    #[test]
    fn test_yield_waits_for_upgrade_to_finish() {
        let lock = ReadWriteSpinLock::new();
        let released = AtomicBool::new(false);
        lock.rdlock();
        assert!(unsafe { lock.rd2wrlock() });

        thread::scope(|s| {
            s.spawn(|| {
                lock.rd2wryield();
                assert!(released.load(StdOrdering::SeqCst));
            });
            thread::sleep(Duration::from_millis(20));
            released.store(true, StdOrdering::SeqCst);
            unsafe { lock.wrunlock() };
        });
    }

    #[test]
    fn test_mutual_exclusion_counter() {
        let lock = ReadWriteSpinLock::new();
        let counter = AtomicUsize::new(0);
        let inside = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        lock.wrlock();
                        assert_eq!(inside.fetch_add(1, StdOrdering::SeqCst), 0);
                        counter.fetch_add(1, StdOrdering::Relaxed);
                        inside.fetch_sub(1, StdOrdering::SeqCst);
                        unsafe { lock.wrunlock() };
                    }
                });
            }
        });

        assert_eq!(counter.load(StdOrdering::Relaxed), 4000);
    }

    #[test]
    fn test_debug_format() {
        let lock = ReadWriteSpinLock::new();
        lock.rdlock();
        let text = format!("{lock:?}");
        assert!(text.contains("readers: 1"));
        unsafe { lock.rdunlock() };
    }
}
