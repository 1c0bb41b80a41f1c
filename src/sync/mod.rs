//! Raw lock primitives.
//!
//! These are the concrete backends plugged into the policies in
//! [`crate::policy`]. None of them owns data; they only track lock state.
//!
//! - [`ReadWriteSpinLock`]: busy-waiting readers/writer lock with upgrade and
//!   downgrade support.
//! - [`ReadWriteMutex`]: the same protocol, parking contended threads on the
//!   OS wait-address facility after a short spin.
//! - [`FutexMutex`]: a three-state exclusive lock.

mod mutex;
pub(crate) mod primitives;
mod rw_mutex;
mod spin_rwlock;

pub use mutex::FutexMutex;
pub use rw_mutex::ReadWriteMutex;
pub use spin_rwlock::ReadWriteSpinLock;

use core::sync::atomic::AtomicU32;
#[cfg(not(any(windows, target_os = "linux")))]
use core::sync::atomic::Ordering;

#[cfg(windows)]
use windows_sys::Win32::System::Threading::{WaitOnAddress, WakeByAddressAll, WakeByAddressSingle};

#[cfg(target_os = "linux")]
use libc::{SYS_futex, FUTEX_PRIVATE_FLAG, FUTEX_WAIT, FUTEX_WAKE};

#[cfg(target_os = "linux")]
#[inline]
fn futex_wait(addr: &AtomicU32, expected: u32) {
    // SAFETY: `addr` is a live, aligned 32-bit atomic for the whole call.
    unsafe {
        libc::syscall(
            SYS_futex,
            addr.as_ptr(),
            FUTEX_WAIT | FUTEX_PRIVATE_FLAG,
            expected,
            core::ptr::null::<libc::timespec>(),
        );
    }
}

#[cfg(target_os = "linux")]
#[inline]
fn futex_wake(addr: &AtomicU32, count: i32) {
    // SAFETY: `addr` is a live, aligned 32-bit atomic for the whole call.
    unsafe {
        libc::syscall(SYS_futex, addr.as_ptr(), FUTEX_WAKE | FUTEX_PRIVATE_FLAG, count);
    }
}

/// Blocks the calling thread while `addr` still holds `expected`.
///
/// Spurious returns are possible; callers re-check their condition.
#[inline]
pub(crate) fn wait_on_u32(addr: &AtomicU32, expected: u32) {
    #[cfg(windows)]
    // SAFETY: both pointers are valid for `size_of::<u32>()` bytes.
    unsafe {
        let expected_ptr = core::ptr::addr_of!(expected).cast();
        WaitOnAddress(addr.as_ptr().cast(), expected_ptr, core::mem::size_of::<u32>(), u32::MAX);
    }
    #[cfg(target_os = "linux")]
    futex_wait(addr, expected);
    #[cfg(not(any(windows, target_os = "linux")))]
    while addr.load(Ordering::SeqCst) == expected {
        std::thread::yield_now();
    }
}

/// Wakes every thread blocked in [`wait_on_u32`] on `addr`.
#[inline]
pub(crate) fn wake_all_u32(addr: &AtomicU32) {
    #[cfg(windows)]
    // SAFETY: `addr` is a live atomic.
    unsafe {
        WakeByAddressAll(addr.as_ptr().cast());
    }
    #[cfg(target_os = "linux")]
    futex_wake(addr, i32::MAX);
    #[cfg(not(any(windows, target_os = "linux")))]
    let _ = addr;
}

/// Wakes at most one thread blocked in [`wait_on_u32`] on `addr`.
#[inline]
pub(crate) fn wake_one_u32(addr: &AtomicU32) {
    #[cfg(windows)]
    // SAFETY: `addr` is a live atomic.
    unsafe {
        WakeByAddressSingle(addr.as_ptr().cast());
    }
    #[cfg(target_os = "linux")]
    futex_wake(addr, 1);
    #[cfg(not(any(windows, target_os = "linux")))]
    let _ = addr;
}
