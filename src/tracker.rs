//! Weak, move-proof handles to wrapped values.
//!
//! A [`Tracked`] owns an [`Unlocked`] at a stable heap address and shares an
//! [`ObjectTracker`] that points at it. Other threads keep a
//! [`Weak`](std::sync::Weak) to the tracker, upgrade it when they need the
//! value, and mint tokens through it. Moving the `Tracked` never moves the
//! value; dropping it clears the tracker, after which minting fails with
//! [`AccessError::ObjectGone`].
//!
//! ```rust
//! use threadsafe::{AccessError, ReadWrite, ReadWriteMutex, Tracked};
//!
//! let tracked: Tracked<u32, ReadWrite<ReadWriteMutex>> = Tracked::new(1);
//! let weak = tracked.weak();
//!
//! let moved = tracked;
//! let tracker = weak.upgrade().unwrap();
//! *tracker.tracked_wat().unwrap() += 1;
//! assert_eq!(*tracker.tracked_crat().unwrap(), 2);
//!
//! drop(moved);
//! assert_eq!(tracker.tracked_rat().err(), Some(AccessError::ObjectGone));
//! ```
//!
//! Dropping a `Tracked` waits for every token minted through its tracker. A
//! thread that drops it while still holding such a token deadlocks, or, under
//! [`OneThread`](crate::OneThread), panics on the conflicting write lock.
//!
//! The back-pointer sits behind a read-write lock: minting and inspection
//! share it, and only clearing excludes. A mint blocked on the wrapper's lock
//! therefore never holds up other mints or [`ObjectTracker::is_tracking`].

use crate::error::AccessError;
use crate::policy::{Policy, ReadWrite};
use crate::prelude::*;
use crate::sync::ReadWriteSpinLock;
use crate::unlocked::{ConstReadAccess, ReadAccess, Unlocked, WriteAccess};
use core::fmt;
use core::mem::ManuallyDrop;
use core::ops::Deref;
use core::ptr::NonNull;
use std::sync::{Arc, Weak};

/// Back-pointer to the tracked wrapper, `None` once it is gone.
struct Target<T, P>(Option<NonNull<Unlocked<T, P>>>);

// SAFETY: the pointer stands for a shared reference to the wrapper.
unsafe impl<T, P> Send for Target<T, P> where Unlocked<T, P>: Sync {}
unsafe impl<T, P> Sync for Target<T, P> where Unlocked<T, P>: Sync {}

/// Shared cell pointing at a live tracked wrapper.
pub struct ObjectTracker<T, P> {
    target: Unlocked<Target<T, P>, ReadWrite<ReadWriteSpinLock>>,
}

impl<T, P: Policy> ObjectTracker<T, P> {
    fn tracking(unlocked: NonNull<Unlocked<T, P>>) -> Self {
        Self {
            target: Unlocked::new(Target(Some(unlocked))),
        }
    }

    /// Returns `true` while the tracked wrapper exists.
    pub fn is_tracking(&self) -> bool {
        self.target.crat().0.is_some()
    }

    /// Mints a token on the tracked wrapper while holding a read lock on the
    /// back-pointer, so the wrapper cannot be retired between the lookup and
    /// the lock.
    fn mint<'a, A>(
        &'a self,
        mint: impl FnOnce(&'a Unlocked<T, P>) -> A,
    ) -> Result<A, AccessError> {
        let target = self.target.crat();
        let Some(ptr) = target.0 else {
            trace_event!(debug, "object tracker: tracked object is gone");
            return Err(AccessError::ObjectGone);
        };
        // SAFETY: the pointer is cleared under the back-pointer's write lock
        // before the wrapper is retired, and retiring waits for the wrapper's
        // write lock, so the wrapper outlives any token minted here.
        let unlocked = unsafe { ptr.as_ref() };
        Ok(mint(unlocked))
    }

    /// Mints a const-read token on the tracked wrapper.
    ///
    /// # Errors
    ///
    /// [`AccessError::ObjectGone`] once the wrapper has been dropped.
    pub fn tracked_crat(&self) -> Result<ConstReadAccess<'_, T, P>, AccessError> {
        self.mint(ConstLockable::crat)
    }

    /// Mints a read token on the tracked wrapper.
    ///
    /// # Errors
    ///
    /// [`AccessError::ObjectGone`] once the wrapper has been dropped.
    pub fn tracked_rat(&self) -> Result<ReadAccess<'_, T, P>, AccessError> {
        self.mint(Lockable::rat)
    }

    /// Mints a write token on the tracked wrapper.
    ///
    /// # Errors
    ///
    /// [`AccessError::ObjectGone`] once the wrapper has been dropped.
    pub fn tracked_wat(&self) -> Result<WriteAccess<'_, T, P>, AccessError> {
        self.mint(Lockable::wat)
    }

    fn clear(&self) {
        self.target.wat().0 = None;
        trace_event!(debug, "object tracker: cleared");
    }
}

impl<T, P: Policy> fmt::Debug for ObjectTracker<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectTracker")
            .field("tracking", &self.is_tracking())
            .finish()
    }
}

/// An [`Unlocked`] with a stable address and a shared [`ObjectTracker`].
///
/// Derefs to the wrapper, so tokens are minted from it exactly as from an
/// `Unlocked`.
///
/// # Panics
///
/// Dropping it, or calling [`into_inner`](Self::into_inner), takes the
/// wrapper's write lock. Under [`OneThread`](crate::OneThread) that panics
/// while a token on the wrapper is still alive; under the other policies the
/// calling thread blocks until those tokens are gone, and deadlocks if it
/// holds one itself.
pub struct Tracked<T, P: Policy> {
    unlocked: NonNull<Unlocked<T, P>>,
    tracker: Arc<ObjectTracker<T, P>>,
}

// SAFETY: owns the wrapper; other threads only ever reach it through shared
// references.
unsafe impl<T, P: Policy> Send for Tracked<T, P> where Unlocked<T, P>: Send + Sync {}
unsafe impl<T, P: Policy> Sync for Tracked<T, P> where Unlocked<T, P>: Sync {}

impl<T, P: Policy> Tracked<T, P> {
    /// Wraps `value` under an explicitly constructed policy and starts tracking it.
    pub fn with_policy(value: T, policy: P) -> Self {
        let unlocked = NonNull::from(Box::leak(Box::new(Unlocked::with_policy(value, policy))));
        Self {
            unlocked,
            tracker: Arc::new(ObjectTracker::tracking(unlocked)),
        }
    }

    /// Wraps `value` under a default-constructed policy and starts tracking it.
    pub fn new(value: T) -> Self
    where
        P: Default,
    {
        Self::with_policy(value, P::default())
    }

    /// Returns the shared tracker.
    pub fn tracker(&self) -> &Arc<ObjectTracker<T, P>> {
        &self.tracker
    }

    /// Returns a weak handle to the tracker.
    pub fn weak(&self) -> Weak<ObjectTracker<T, P>> {
        Arc::downgrade(&self.tracker)
    }

    /// Stops tracking and unwraps the value.
    pub fn into_inner(self) -> T {
        let this = ManuallyDrop::new(self);
        this.retire();
        // SAFETY: `this` is never dropped, so each field is moved out once.
        let tracker = unsafe { core::ptr::read(&this.tracker) };
        drop(tracker);
        // SAFETY: allocated by `Box` in `with_policy`; nothing else can reach
        // it after `retire`.
        let unlocked = unsafe { Box::from_raw(this.unlocked.as_ptr()) };
        unlocked.into_inner()
    }

    /// Clears the tracker, then waits until no token minted through it is alive.
    fn retire(&self) {
        self.tracker.clear();
        drop(self.wat());
    }
}

impl<T, P: Policy> Deref for Tracked<T, P> {
    type Target = Unlocked<T, P>;

    fn deref(&self) -> &Unlocked<T, P> {
        // SAFETY: owned by `self` until drop.
        unsafe { self.unlocked.as_ref() }
    }
}

impl<T, P: Policy> Drop for Tracked<T, P> {
    fn drop(&mut self) {
        self.retire();
        // SAFETY: allocated by `Box` in `with_policy`; nothing else can reach
        // it after `retire`.
        drop(unsafe { Box::from_raw(self.unlocked.as_ptr()) });
    }
}

impl<T, P: Policy + fmt::Debug> fmt::Debug for Tracked<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("unlocked", &**self)
            .field("tracker", &self.tracker)
            .finish()
    }
}
