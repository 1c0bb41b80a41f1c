//! `WriteToReadCarry`: failure-free write-to-read downgrade.

use super::access::{ConstReadAccess, ReadAccess, WriteAccess, WriteRelease};
use super::RawAccess;
use crate::policy::Policy;
use core::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CarryState {
    Idle,
    Read,
}

/// Holds the read lock a write token leaves behind.
///
/// Create the carry before any token, mint one write token from it with
/// [`wat`](Self::wat), and when that token drops the write lock turns into a
/// read lock owned by the carry without ever being released. Read tokens
/// minted afterwards with [`rat`](Self::rat) share that lock.
///
/// ```rust
/// use threadsafe::prelude::*;
/// use threadsafe::{ReadWrite, ReadWriteSpinLock, Unlocked};
///
/// let value: Unlocked<String, ReadWrite<ReadWriteSpinLock>> = Unlocked::default();
/// let lock = value.policy().raw();
///
/// let mut carry = value.w2r_carry();
/// assert!(lock.is_unlocked());
/// carry.wat().push_str("hello");
/// assert!(lock.is_read_locked());
/// assert_eq!(*carry.rat(), "hello");
/// drop(carry);
/// assert!(lock.is_unlocked());
/// ```
#[must_use = "a carry that is never used only holds a borrow"]
pub struct WriteToReadCarry<'a, T: ?Sized, P: Policy> {
    raw: RawAccess<'a, T, P>,
    state: CarryState,
    _not_send: PhantomData<*const ()>,
}

impl<'a, T: ?Sized, P: Policy> WriteToReadCarry<'a, T, P> {
    pub(crate) fn new(raw: RawAccess<'a, T, P>) -> Self {
        Self {
            raw,
            state: CarryState::Idle,
            _not_send: PhantomData,
        }
    }

    /// Takes the write lock. Dropping the returned token leaves a read lock
    /// in the carry.
    ///
    /// # Panics
    ///
    /// Panics if the carry already holds a read lock.
    pub fn wat(&mut self) -> WriteAccess<'_, T, P> {
        assert!(
            self.state == CarryState::Idle,
            "WriteToReadCarry: write access requested while the carry holds a read lock"
        );
        self.raw.policy().wrlock();
        WriteAccess::new(self.raw, WriteRelease::IntoCarry(&mut self.state))
    }

    /// Returns a read token sharing the carry's read lock, taking that lock
    /// first if the carry holds none yet.
    pub fn rat(&mut self) -> ReadAccess<'_, T, P> {
        if self.state == CarryState::Idle {
            self.raw.policy().rdlock();
            self.state = CarryState::Read;
        }
        ReadAccess::alias(self.raw)
    }

    /// Returns a const-read token sharing the carry's read lock, or `None`
    /// while the carry holds no lock.
    pub fn crat(&self) -> Option<ConstReadAccess<'_, T, P>> {
        match self.state {
            CarryState::Read => Some(ConstReadAccess::alias(self.raw)),
            CarryState::Idle => None,
        }
    }

    /// Returns `true` once the carry owns a read lock.
    pub fn is_read_locked(&self) -> bool {
        self.state == CarryState::Read
    }
}

impl<T: ?Sized, P: Policy> Drop for WriteToReadCarry<'_, T, P> {
    fn drop(&mut self) {
        if self.state == CarryState::Read {
            // SAFETY: the carry owns this read lock.
            unsafe { self.raw.policy().rdunlock() };
        }
    }
}
