//! # `threadsafe` - Policy-Governed Shared Values
//!
//! Statically typed, policy-parameterized access to values shared between
//! threads. A value lives inside an [`Unlocked`] wrapper together with a
//! locking [`Policy`]; code reaches the value only through *access tokens*
//! whose type encodes the lock they hold.
//!
//! ## Core Abstractions
//!
//! 1. **Raw primitives** ([`sync`]):
//!    - [`ReadWriteSpinLock`]: N readers XOR one writer, writer priority,
//!      failure-free downgrade and retryable upgrade.
//!    - [`ReadWriteMutex`]: the same contract, but parks contended threads.
//!    - [`FutexMutex`]: a plain exclusive lock.
//!
//! 2. **Policies** ([`policy`]):
//!    - [`OneThread`]: no synchronization; the wrapper is `!Sync`.
//!    - [`Primitive`]: every token maps onto one exclusive lock.
//!    - [`ReadWrite`]: read tokens share, write tokens exclude.
//!
//! 3. **Access tokens** ([`unlocked`]):
//!    - [`ConstReadAccess`] (`crat`): read-only, never upgradeable.
//!    - [`ReadAccess`] (`rat`): read-only, one upgrade attempt.
//!    - [`WriteAccess`] (`wat`): read-write.
//!    - [`WriteToReadCarry`]: reserves a failure-free write-to-read downgrade.
//!
//! 4. **Base views** ([`UnlockedBase`], [`ConstUnlockedBase`]): non-owning views
//!    that expose a wrapper of a derived type as its base, sharing its policy.
//!
//! 5. **Object tracking** ([`tracker`]): a weak, move-proof handle that can mint
//!    tokens for as long as the tracked wrapper exists.
//!
//! ## State machine
//!
//! ```text
//! Unlocked --crat/rat--> SharedLocked   --drop--> Unlocked
//! Unlocked --wat-------> ExclusiveLocked --drop--> Unlocked
//! SharedLocked   --rat.upgrade()--> ExclusiveLocked | Err(UpgradeContended)
//! ExclusiveLocked --drop wat minted from carry--> SharedLocked (held by carry)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use threadsafe::prelude::*;
//! use threadsafe::{ReadWrite, ReadWriteSpinLock, Unlocked};
//!
//! let counter: Unlocked<u32, ReadWrite<ReadWriteSpinLock>> = Unlocked::new(0);
//!
//! {
//!     let mut w = counter.wat();
//!     *w += 1;
//! }
//!
//! loop {
//!     let mut r = counter.rat();
//!     if *r > 10 {
//!         break;
//!     }
//!     if let Ok(mut w) = r.upgrade() {
//!         *w += 41;
//!         break;
//!     }
//!     // Another reader is inside: release, back off, start over.
//!     drop(r);
//!     counter.rd2wryield();
//! }
//!
//! assert_eq!(*counter.crat(), 42);
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

#[macro_use]
mod macros;

pub mod error;
pub mod policy;
pub mod sync;
pub mod tracker;
pub mod unlocked;

pub use error::AccessError;
pub use policy::{OneThread, Policy, Primitive, RawMutex, RawRwLock, ReadWrite};
pub use sync::{FutexMutex, ReadWriteMutex, ReadWriteSpinLock};
pub use tracker::{ObjectTracker, Tracked};
pub use unlocked::{
    ConstLockable, ConstReadAccess, ConstUnlockedBase, Derived, Lockable, ReadAccess, Unlocked,
    UnlockedBase, WriteAccess, WriteToReadCarry,
};

/// Traits needed to mint access tokens from wrappers and views.
pub mod prelude {
    pub use crate::unlocked::{ConstLockable, Lockable};
}

// Compile-time assertions for wrapper layout. Loom's instrumented atomics are
// larger than the real ones, so the size checks only hold in normal builds.
#[cfg(not(loom))]
const _: () = {
    use core::mem;

    // The wrapper never weakens the alignment of the value it owns.
    assert!(mem::align_of::<Unlocked<u64, Primitive<FutexMutex>>>() % mem::align_of::<u64>() == 0);
    assert!(mem::align_of::<Unlocked<u8, ReadWrite<ReadWriteSpinLock>>>() % mem::align_of::<u8>() == 0);
    assert!(mem::align_of::<Unlocked<u128, ReadWrite<ReadWriteMutex>>>() % mem::align_of::<u128>() == 0);

    // Each lock primitive is a single word of state, or two for the parking mutex.
    assert!(mem::size_of::<ReadWriteSpinLock>() == mem::size_of::<u32>());
    assert!(mem::size_of::<FutexMutex>() == mem::size_of::<u32>());
    assert!(mem::size_of::<ReadWriteMutex>() <= mem::size_of::<u32>() * 4);

    // Views are two pointers wide for sized bases.
    assert!(mem::size_of::<UnlockedBase<'static, u64, ReadWrite<ReadWriteSpinLock>>>() == mem::size_of::<usize>() * 2);
};
