//! Access tokens.
//!
//! A token's type is the lock it holds. Conversions that would break the
//! reader/writer invariant do not type-check:
//!
//! Writing through a const-read token:
//!
//! ```compile_fail
//! use threadsafe::prelude::*;
//! use threadsafe::{ReadWrite, ReadWriteSpinLock, Unlocked};
//!
//! let value: Unlocked<u32, ReadWrite<ReadWriteSpinLock>> = Unlocked::new(0);
//! let r = value.crat();
//! *r = 1;
//! ```
//!
//! Upgrading a const-read token:
//!
//! ```compile_fail
//! use threadsafe::prelude::*;
//! use threadsafe::{ReadWrite, ReadWriteSpinLock, Unlocked};
//!
//! let value: Unlocked<u32, ReadWrite<ReadWriteSpinLock>> = Unlocked::new(0);
//! let mut r = value.crat();
//! let _w = r.upgrade();
//! ```
//!
//! Write or read intent through a const view:
//!
//! ```compile_fail
//! use threadsafe::prelude::*;
//! use threadsafe::{ReadWrite, ReadWriteSpinLock, Unlocked};
//!
//! let value: Unlocked<u32, ReadWrite<ReadWriteSpinLock>> = Unlocked::new(0);
//! let view = value.as_const();
//! let _w = view.wat();
//! ```
//!
//! ```compile_fail
//! use threadsafe::prelude::*;
//! use threadsafe::{ReadWrite, ReadWriteSpinLock, Unlocked};
//!
//! let value: Unlocked<u32, ReadWrite<ReadWriteSpinLock>> = Unlocked::new(0);
//! let view = value.as_const();
//! let _r = view.rat();
//! ```
//!
//! Two write tokens out of one read token:
//!
//! ```compile_fail
//! use threadsafe::prelude::*;
//! use threadsafe::{ReadWrite, ReadWriteSpinLock, Unlocked};
//!
//! let value: Unlocked<u32, ReadWrite<ReadWriteSpinLock>> = Unlocked::new(0);
//! let mut r = value.rat();
//! let w1 = r.upgrade().unwrap();
//! let w2 = r.upgrade().unwrap();
//! drop((w1, w2));
//! ```
//!
//! Copying a token:
//!
//! ```compile_fail
//! use threadsafe::prelude::*;
//! use threadsafe::{ReadAccess, ReadWrite, ReadWriteSpinLock, Unlocked};
//!
//! struct Foo;
//!
//! let value: Unlocked<Foo, ReadWrite<ReadWriteSpinLock>> = Unlocked::new(Foo);
//! let r = value.rat();
//! let copy: ReadAccess<'_, Foo, ReadWrite<ReadWriteSpinLock>> = r.clone();
//! ```
//!
//! Releasing a lock on another thread:
//!
//! ```compile_fail
//! use threadsafe::prelude::*;
//! use threadsafe::{ReadWrite, ReadWriteSpinLock, Unlocked};
//!
//! fn assert_send<S: Send>(_: S) {}
//!
//! let value: Unlocked<u32, ReadWrite<ReadWriteSpinLock>> = Unlocked::new(0);
//! assert_send(value.wat());
//! ```

use super::carry::CarryState;
use super::RawAccess;
use crate::error::AccessError;
use crate::policy::Policy;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

/// Read-only access that can never become write access.
///
/// Either owns a read lock, or aliases a lock owned by the token or carry it
/// was obtained from.
#[must_use = "the lock is released as soon as the token is dropped"]
pub struct ConstReadAccess<'a, T: ?Sized, P: Policy> {
    raw: RawAccess<'a, T, P>,
    owns_lock: bool,
    _not_send: PhantomData<*const ()>,
}

// SAFETY: sharing the token only shares `&T`.
unsafe impl<T: ?Sized + Sync, P: Policy + Sync> Sync for ConstReadAccess<'_, T, P> {}

impl<'a, T: ?Sized, P: Policy> ConstReadAccess<'a, T, P> {
    pub(crate) fn acquire(raw: RawAccess<'a, T, P>) -> Self {
        raw.policy().rdlock();
        Self {
            raw,
            owns_lock: true,
            _not_send: PhantomData,
        }
    }

    /// The caller must keep a read or write lock alive for `'a`.
    pub(crate) fn alias(raw: RawAccess<'a, T, P>) -> Self {
        Self {
            raw,
            owns_lock: false,
            _not_send: PhantomData,
        }
    }
}

impl<T: ?Sized, P: Policy> Deref for ConstReadAccess<'_, T, P> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: a read lock is held for as long as `self` lives.
        unsafe { self.raw.ptr().as_ref() }
    }
}

impl<T: ?Sized, P: Policy> Drop for ConstReadAccess<'_, T, P> {
    fn drop(&mut self) {
        if self.owns_lock {
            // SAFETY: `acquire` took this read lock.
            unsafe { self.raw.policy().rdunlock() };
        }
    }
}

impl<T: ?Sized + fmt::Debug, P: Policy> fmt::Debug for ConstReadAccess<'_, T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Read-only access that may be upgraded to write access.
#[must_use = "the lock is released as soon as the token is dropped"]
pub struct ReadAccess<'a, T: ?Sized, P: Policy> {
    read: ConstReadAccess<'a, T, P>,
    lost_upgrade: bool,
}

impl<'a, T: ?Sized, P: Policy> ReadAccess<'a, T, P> {
    pub(crate) fn acquire(raw: RawAccess<'a, T, P>) -> Self {
        Self {
            read: ConstReadAccess::acquire(raw),
            lost_upgrade: false,
        }
    }

    pub(crate) fn alias(raw: RawAccess<'a, T, P>) -> Self {
        Self {
            read: ConstReadAccess::alias(raw),
            lost_upgrade: false,
        }
    }

    /// Returns a const-read token sharing this token's lock.
    pub fn as_crat(&self) -> ConstReadAccess<'_, T, P> {
        ConstReadAccess::alias(self.read.raw)
    }

    /// Converts the read lock into the write lock for the lifetime of the
    /// returned token, after which it is a read lock again.
    ///
    /// # Errors
    ///
    /// [`AccessError::UpgradeContended`] when any other read lock exists, held
    /// by this thread or another one. The read lock is still held, and this
    /// token refuses any further upgrade:
    /// drop it, call [`rd2wryield`](super::Lockable::rd2wryield), and start over
    /// from a fresh read token.
    pub fn upgrade(&mut self) -> Result<WriteAccess<'_, T, P>, AccessError> {
        if self.lost_upgrade {
            return Err(AccessError::UpgradeContended);
        }
        let raw = self.read.raw;
        // SAFETY: `self.read` is backed by a read lock, owned or aliased.
        if unsafe { raw.policy().rd2wrlock() } {
            Ok(WriteAccess::new(raw, WriteRelease::Downgrade))
        } else {
            trace_event!(debug, "read-to-write upgrade refused");
            self.lost_upgrade = true;
            Err(AccessError::UpgradeContended)
        }
    }
}

impl<T: ?Sized, P: Policy> Deref for ReadAccess<'_, T, P> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.read
    }
}

impl<T: ?Sized + fmt::Debug, P: Policy> fmt::Debug for ReadAccess<'_, T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// What a write token does with its lock when dropped.
pub(crate) enum WriteRelease<'a> {
    /// Minted directly: release the write lock.
    Unlock,
    /// Minted by upgrade: convert back to the read lock of the source token.
    Downgrade,
    /// Minted from a carry: convert to a read lock the carry now owns.
    IntoCarry(&'a mut CarryState),
}

/// Exclusive read-write access.
#[must_use = "the lock is released as soon as the token is dropped"]
pub struct WriteAccess<'a, T: ?Sized, P: Policy> {
    raw: RawAccess<'a, T, P>,
    release: WriteRelease<'a>,
    _marker: PhantomData<(&'a mut T, *const ())>,
}

// SAFETY: sharing the token only shares `&T`.
unsafe impl<T: ?Sized + Sync, P: Policy + Sync> Sync for WriteAccess<'_, T, P> {}

impl<'a, T: ?Sized, P: Policy> WriteAccess<'a, T, P> {
    pub(crate) fn acquire(raw: RawAccess<'a, T, P>) -> Self {
        raw.policy().wrlock();
        Self::new(raw, WriteRelease::Unlock)
    }

    /// The caller must hold the write lock.
    pub(crate) fn new(raw: RawAccess<'a, T, P>, release: WriteRelease<'a>) -> Self {
        Self {
            raw,
            release,
            _marker: PhantomData,
        }
    }

    /// Returns a const-read token sharing this token's lock.
    pub fn as_crat(&self) -> ConstReadAccess<'_, T, P> {
        ConstReadAccess::alias(self.raw)
    }
}

impl<T: ?Sized, P: Policy> Deref for WriteAccess<'_, T, P> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the write lock is held for as long as `self` lives.
        unsafe { self.raw.ptr().as_ref() }
    }
}

impl<T: ?Sized, P: Policy> DerefMut for WriteAccess<'_, T, P> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the write lock is held and `&mut self` is unique.
        unsafe { self.raw.ptr().as_mut() }
    }
}

impl<T: ?Sized, P: Policy> Drop for WriteAccess<'_, T, P> {
    fn drop(&mut self) {
        let policy = self.raw.policy();
        // SAFETY: the write lock is held.
        match &mut self.release {
            WriteRelease::Unlock => unsafe { policy.wrunlock() },
            WriteRelease::Downgrade => unsafe { policy.wr2rdlock() },
            WriteRelease::IntoCarry(state) => {
                unsafe { policy.wr2rdlock() };
                **state = CarryState::Read;
            }
        }
    }
}

impl<T: ?Sized + fmt::Debug, P: Policy> fmt::Debug for WriteAccess<'_, T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
