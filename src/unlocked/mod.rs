//! The `Unlocked` wrapper and everything that reaches into it.
//!
//! A value stored in an [`Unlocked`] is only reachable through access tokens:
//!
//! - [`ConstReadAccess`] from [`ConstLockable::crat`]
//! - [`ReadAccess`] from [`Lockable::rat`]
//! - [`WriteAccess`] from [`Lockable::wat`] or [`ReadAccess::upgrade`]
//! - [`WriteToReadCarry`] from [`Lockable::w2r_carry`]
//!
//! Views ([`UnlockedBase`], [`ConstUnlockedBase`]) mint the same tokens on the
//! same policy instance, typed as a base of the wrapped value.

mod access;
mod base;
mod carry;

pub use access::{ConstReadAccess, ReadAccess, WriteAccess};
pub use base::{ConstUnlockedBase, Derived, UnlockedBase};
pub use carry::WriteToReadCarry;

use crate::policy::Policy;
use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;

/// A value of type `T` that can only be accessed under policy `P`.
pub struct Unlocked<T, P> {
    policy: P,
    value: UnsafeCell<T>,
}

// SAFETY: tokens hand out `&T` to many threads (needs `T: Sync`) and `&mut T`
// to any thread (needs `T: Send`); every thread touches the policy.
unsafe impl<T: Send + Sync, P: Sync> Sync for Unlocked<T, P> {}

impl<T, P> Unlocked<T, P> {
    /// Wraps `value` under an explicitly constructed policy.
    pub const fn with_policy(value: T, policy: P) -> Self {
        Self {
            policy,
            value: UnsafeCell::new(value),
        }
    }

    /// Wraps `value` under a default-constructed policy.
    pub fn new(value: T) -> Self
    where
        P: Default,
    {
        Self::with_policy(value, P::default())
    }

    /// Unwraps the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    /// Returns a mutable reference to the value without locking. The
    /// exclusive borrow proves no token exists.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    /// Returns the policy instance, for lock-state inspection.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Returns a view through which only const-read tokens can be minted.
    pub fn as_const(&self) -> ConstUnlockedBase<'_, T, P> {
        ConstUnlockedBase::new(self)
    }

    /// Returns a view of this wrapper typed as the base `B`.
    pub fn as_base<B: ?Sized>(&self) -> UnlockedBase<'_, B, P>
    where
        T: Derived<B>,
    {
        UnlockedBase::new(self)
    }

    fn raw(&self) -> RawAccess<'_, T, P> {
        // SAFETY: `UnsafeCell::get` never returns null.
        let ptr = unsafe { NonNull::new_unchecked(self.value.get()) };
        RawAccess::new(ptr, &self.policy)
    }
}

impl<T: Default, P: Default> Default for Unlocked<T, P> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T, P: Default> From<T> for Unlocked<T, P> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Clone, P: Policy + Default> Clone for Unlocked<T, P> {
    /// Clones the value under a const-read token of the source.
    fn clone(&self) -> Self {
        Self::new(T::clone(&self.crat()))
    }
}

impl<T, P: fmt::Debug> fmt::Debug for Unlocked<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unlocked")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Pointer to a locked value plus the policy guarding it.
///
/// This is what every wrapper, view and token carries internally. It has no
/// public operations.
#[doc(hidden)]
pub struct RawAccess<'a, T: ?Sized, P> {
    ptr: NonNull<T>,
    policy: &'a P,
    _marker: PhantomData<&'a UnsafeCell<T>>,
}

impl<'a, T: ?Sized, P> RawAccess<'a, T, P> {
    pub(crate) fn new(ptr: NonNull<T>, policy: &'a P) -> Self {
        Self {
            ptr,
            policy,
            _marker: PhantomData,
        }
    }

    pub(crate) fn ptr(self) -> NonNull<T> {
        self.ptr
    }

    pub(crate) fn policy(self) -> &'a P {
        self.policy
    }

    pub(crate) fn project<B: ?Sized>(self) -> RawAccess<'a, B, P>
    where
        T: Derived<B>,
    {
        let upcast = T::upcast(self.ptr.as_ptr());
        // SAFETY: `Derived::upcast` maps a valid pointer to a valid pointer.
        let ptr = unsafe { NonNull::new_unchecked(upcast) };
        RawAccess::new(ptr, self.policy)
    }
}

impl<T: ?Sized, P> Clone for RawAccess<'_, T, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized, P> Copy for RawAccess<'_, T, P> {}

mod sealed {
    pub trait Sealed {}

    impl<T, P> Sealed for super::Unlocked<T, P> {}
    impl<B: ?Sized, P> Sealed for super::UnlockedBase<'_, B, P> {}
    impl<B: ?Sized, P> Sealed for super::ConstUnlockedBase<'_, B, P> {}
}

/// Anything that can mint const-read tokens.
pub trait ConstLockable: sealed::Sealed {
    /// The type tokens dereference to.
    type Target: ?Sized;
    /// The policy guarding the value.
    type Policy: Policy;

    #[doc(hidden)]
    fn raw_access(&self) -> RawAccess<'_, Self::Target, Self::Policy>;

    /// Takes a read lock and returns a token that can never be upgraded.
    fn crat(&self) -> ConstReadAccess<'_, Self::Target, Self::Policy> {
        ConstReadAccess::acquire(self.raw_access())
    }
}

/// Anything that can mint every kind of token.
pub trait Lockable: ConstLockable {
    /// Takes a read lock and returns a token that may later be upgraded.
    fn rat(&self) -> ReadAccess<'_, Self::Target, Self::Policy> {
        ReadAccess::acquire(self.raw_access())
    }

    /// Takes the write lock.
    fn wat(&self) -> WriteAccess<'_, Self::Target, Self::Policy> {
        WriteAccess::acquire(self.raw_access())
    }

    /// Returns a carry that holds no lock yet. A write token minted from it
    /// downgrades into a read lock owned by the carry.
    fn w2r_carry(&self) -> WriteToReadCarry<'_, Self::Target, Self::Policy> {
        WriteToReadCarry::new(self.raw_access())
    }

    /// Waits until a concurrent upgrade has resolved. Call after dropping a
    /// read token whose upgrade failed, then retry.
    fn rd2wryield(&self) {
        self.raw_access().policy().rd2wryield();
    }
}

impl<T, P: Policy> ConstLockable for Unlocked<T, P> {
    type Target = T;
    type Policy = P;

    fn raw_access(&self) -> RawAccess<'_, T, P> {
        self.raw()
    }
}

impl<T, P: Policy> Lockable for Unlocked<T, P> {}
