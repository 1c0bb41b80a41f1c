//! Locking policies.
//!
//! A policy decides how an [`Unlocked`](crate::Unlocked) wrapper turns token
//! construction and destruction into lock operations. Three policies exist:
//!
//! | Policy | Read tokens | Write tokens | Upgrade | Downgrade |
//! |---|---|---|---|---|
//! | [`OneThread`] | borrow flag | borrow flag | sole reader only | always |
//! | [`Primitive<M>`] | `M::lock` | `M::lock` | always (already exclusive) | no-op |
//! | [`ReadWrite<L>`] | `L::rdlock` | `L::wrlock` | `L::rd2wrlock` | `L::wr2rdlock` |
//!
//! Backends are plugged in through [`RawMutex`] and [`RawRwLock`]; any type
//! honoring those contracts can be substituted for the primitives in
//! [`crate::sync`].

mod one_thread;
mod primitive;
mod read_write;

pub use one_thread::OneThread;
pub use primitive::Primitive;
pub use read_write::ReadWrite;

/// An exclusive lock primitive.
///
/// # Safety
///
/// Between a return from [`lock`](Self::lock) (or a `true` from
/// [`try_lock`](Self::try_lock)) and the matching [`unlock`](Self::unlock),
/// no other `lock` call may return and no other `try_lock` may succeed.
/// Acquisition must synchronize-with the previous release.
pub unsafe trait RawMutex {
    /// Blocks until the lock is held by the caller.
    fn lock(&self);

    /// Acquires the lock if it is free.
    fn try_lock(&self) -> bool;

    /// Releases the lock.
    ///
    /// # Safety
    ///
    /// The caller must hold the lock.
    unsafe fn unlock(&self);
}

/// A readers/writer lock primitive with upgrade and downgrade.
///
/// # Safety
///
/// While any read lock is held no write lock may be granted, and while the
/// write lock is held no other lock may be granted. `rd2wrlock` returning
/// `true` and `wr2rdlock` must convert the caller's lock in place, without an
/// instant at which another thread could acquire a conflicting lock. Every
/// acquisition must synchronize-with the release it follows.
pub unsafe trait RawRwLock {
    /// Blocks until a shared read lock is held.
    fn rdlock(&self);

    /// Releases a read lock.
    ///
    /// # Safety
    ///
    /// The caller must hold a read lock.
    unsafe fn rdunlock(&self);

    /// Blocks until the exclusive write lock is held.
    fn wrlock(&self);

    /// Releases the write lock.
    ///
    /// # Safety
    ///
    /// The caller must hold the write lock.
    unsafe fn wrunlock(&self);

    /// Converts the caller's read lock into the write lock. `false` means the
    /// read lock is still held and the caller must release it before retrying.
    ///
    /// # Safety
    ///
    /// The caller must hold a read lock.
    unsafe fn rd2wrlock(&self) -> bool;

    /// Converts the caller's write lock into a read lock. Never fails.
    ///
    /// # Safety
    ///
    /// The caller must hold the write lock.
    unsafe fn wr2rdlock(&self);

    /// Blocks until a concurrent upgrade elsewhere has been resolved.
    fn rd2wryield(&self);
}

/// The capability set an [`Unlocked`](crate::Unlocked) wrapper drives.
///
/// The operation names follow [`RawRwLock`]; single-lock policies map both
/// read and write onto their one lock.
///
/// # Safety
///
/// Implementations must uphold the [`RawRwLock`] exclusion contract for the
/// calls made through this trait: access tokens hand out `&T` for read locks
/// and `&mut T` for write locks based solely on these calls.
pub unsafe trait Policy {
    /// Acquires the lock backing a read or const-read token.
    fn rdlock(&self);

    /// Releases the lock backing a read or const-read token.
    ///
    /// # Safety
    ///
    /// The caller must hold the read lock.
    unsafe fn rdunlock(&self);

    /// Acquires the lock backing a write token.
    fn wrlock(&self);

    /// Releases the lock backing a write token.
    ///
    /// # Safety
    ///
    /// The caller must hold the write lock.
    unsafe fn wrunlock(&self);

    /// Converts a read lock into a write lock, or reports contention.
    ///
    /// # Safety
    ///
    /// The caller must hold the read lock.
    unsafe fn rd2wrlock(&self) -> bool;

    /// Converts a write lock into a read lock.
    ///
    /// # Safety
    ///
    /// The caller must hold the write lock.
    unsafe fn wr2rdlock(&self);

    /// Waits for a concurrent upgrade to resolve.
    fn rd2wryield(&self);
}
