//! Base-typed views of a wrapper.
//!
//! An [`UnlockedBase<B, P>`] refers to an `Unlocked<D, P>` whose `D` can be
//! seen as a `B`: a trait object it implements, or a field it embeds. Tokens
//! minted from the view lock the wrapper's own policy instance, so code that
//! only knows `B` takes part in the same reader/writer protocol as code that
//! holds the concrete wrapper.
//!
//! ```rust
//! use threadsafe::prelude::*;
//! use threadsafe::{derived, ReadWrite, ReadWriteSpinLock, Unlocked, UnlockedBase};
//!
//! trait Shape {
//!     fn area(&self) -> f64;
//!     fn scale(&mut self, k: f64);
//! }
//!
//! struct Square(f64);
//!
//! impl Shape for Square {
//!     fn area(&self) -> f64 {
//!         self.0 * self.0
//!     }
//!     fn scale(&mut self, k: f64) {
//!         self.0 *= k;
//!     }
//! }
//!
//! derived!(Square => dyn Shape);
//!
//! type Policy = ReadWrite<ReadWriteSpinLock>;
//!
//! fn grow(shape: UnlockedBase<'_, dyn Shape, Policy>) -> f64 {
//!     shape.wat().scale(2.0);
//!     shape.crat().area()
//! }
//!
//! let square: Unlocked<Square, Policy> = Unlocked::new(Square(1.5));
//! assert_eq!(grow(square.as_base()), 9.0);
//! assert_eq!(square.crat().0, 3.0);
//! ```

use super::{ConstLockable, Lockable, RawAccess, Unlocked};
use crate::policy::Policy;
use core::fmt;

/// Declares that a `*mut Self` can be viewed as a `*mut B`.
///
/// Every type is its own base. Use [`derived!`](crate::derived) for
/// trait-object and embedded-field bases.
///
/// # Safety
///
/// `upcast` must return a non-null pointer into the allocation `this` points
/// to, valid for reads and writes wherever `this` is, and must not dereference
/// `this`.
pub unsafe trait Derived<B: ?Sized> {
    /// Projects a pointer to the derived value onto its base.
    fn upcast(this: *mut Self) -> *mut B;
}

// SAFETY: identity.
unsafe impl<T: ?Sized> Derived<T> for T {
    #[inline]
    fn upcast(this: *mut Self) -> *mut T {
        this
    }
}

/// A copyable view of a wrapper, typed as its base `B`, that mints every kind
/// of token.
pub struct UnlockedBase<'a, B: ?Sized, P> {
    raw: RawAccess<'a, B, P>,
}

/// A copyable view of a wrapper, typed as its base `B`, that only mints
/// const-read tokens.
pub struct ConstUnlockedBase<'a, B: ?Sized, P> {
    raw: RawAccess<'a, B, P>,
}

// SAFETY: a view is a shared reference to the wrapper; see `Unlocked`'s `Sync`.
unsafe impl<B: ?Sized + Send + Sync, P: Sync> Send for UnlockedBase<'_, B, P> {}
unsafe impl<B: ?Sized + Send + Sync, P: Sync> Sync for UnlockedBase<'_, B, P> {}
// SAFETY: only ever hands out `&B`.
unsafe impl<B: ?Sized + Sync, P: Sync> Send for ConstUnlockedBase<'_, B, P> {}
unsafe impl<B: ?Sized + Sync, P: Sync> Sync for ConstUnlockedBase<'_, B, P> {}

impl<'a, B: ?Sized, P> UnlockedBase<'a, B, P> {
    /// Views `unlocked` as its base `B`.
    pub fn new<D: Derived<B>>(unlocked: &'a Unlocked<D, P>) -> Self {
        Self {
            raw: unlocked.raw().project(),
        }
    }

    /// Narrows the view further, to a base of `B`.
    pub fn cast<C: ?Sized>(self) -> UnlockedBase<'a, C, P>
    where
        B: Derived<C>,
    {
        UnlockedBase {
            raw: self.raw.project(),
        }
    }

    /// Returns a view of the same wrapper that only mints const-read tokens.
    pub fn as_const(self) -> ConstUnlockedBase<'a, B, P> {
        ConstUnlockedBase { raw: self.raw }
    }

    /// Returns the policy shared with the wrapper.
    pub fn policy(&self) -> &'a P {
        self.raw.policy()
    }
}

impl<'a, B: ?Sized, P> ConstUnlockedBase<'a, B, P> {
    /// Views `unlocked` as its base `B`, read-only.
    pub fn new<D: Derived<B>>(unlocked: &'a Unlocked<D, P>) -> Self {
        Self {
            raw: unlocked.raw().project(),
        }
    }

    /// Narrows the view further, to a base of `B`.
    pub fn cast<C: ?Sized>(self) -> ConstUnlockedBase<'a, C, P>
    where
        B: Derived<C>,
    {
        ConstUnlockedBase {
            raw: self.raw.project(),
        }
    }

    /// Returns the policy shared with the wrapper.
    pub fn policy(&self) -> &'a P {
        self.raw.policy()
    }
}

impl<'a, B: ?Sized, P> From<UnlockedBase<'a, B, P>> for ConstUnlockedBase<'a, B, P> {
    fn from(view: UnlockedBase<'a, B, P>) -> Self {
        view.as_const()
    }
}

impl<B: ?Sized, P> Clone for UnlockedBase<'_, B, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: ?Sized, P> Copy for UnlockedBase<'_, B, P> {}

impl<B: ?Sized, P> Clone for ConstUnlockedBase<'_, B, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: ?Sized, P> Copy for ConstUnlockedBase<'_, B, P> {}

impl<B: ?Sized, P: fmt::Debug> fmt::Debug for UnlockedBase<'_, B, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockedBase")
            .field("policy", self.raw.policy())
            .finish_non_exhaustive()
    }
}

impl<B: ?Sized, P: fmt::Debug> fmt::Debug for ConstUnlockedBase<'_, B, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstUnlockedBase")
            .field("policy", self.raw.policy())
            .finish_non_exhaustive()
    }
}

impl<B: ?Sized, P: Policy> ConstLockable for UnlockedBase<'_, B, P> {
    type Target = B;
    type Policy = P;

    fn raw_access(&self) -> RawAccess<'_, B, P> {
        self.raw
    }
}

impl<B: ?Sized, P: Policy> Lockable for UnlockedBase<'_, B, P> {}

impl<B: ?Sized, P: Policy> ConstLockable for ConstUnlockedBase<'_, B, P> {
    type Target = B;
    type Policy = P;

    fn raw_access(&self) -> RawAccess<'_, B, P> {
        self.raw
    }
}
