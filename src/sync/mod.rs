//! Blocking primitives underneath [`LazyBox`](crate::LazyBox).
//!
//! Threads park on the address of an `AtomicU32` and are woken when the value
//! changes. Linux uses the futex syscall, Windows uses `WaitOnAddress`, and
//! every other target falls back to yielding in a loop.
//!
//! Under `--cfg loom` the atomics come from `loom` and waiting becomes a loom
//! yield, so the gate can be model-checked.

mod cell;
pub(crate) mod gate;



pub(crate) use cell::UnsafeCell;

#[cfg(not(loom))]
pub(crate) use core::sync::atomic::{AtomicU32, Ordering};
#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicU32, Ordering};

#[cfg(all(windows, not(loom)))]
use windows_sys::Win32::System::Threading::{WaitOnAddress, WakeByAddressAll};

#[cfg(all(target_os = "linux", not(loom)))]
use libc::{c_int, SYS_futex, FUTEX_PRIVATE_FLAG, FUTEX_WAIT, FUTEX_WAKE};

/// Issues a process-private futex operation on `word` with no timeout.
#[cfg(all(target_os = "linux", not(loom)))]
#[inline]
fn futex(word: &AtomicU32, op: c_int, val: u32) {
    // SAFETY: `word` is borrowed for the whole call. The kernel keys its wait
    // queue on the address and only reads the value for FUTEX_WAIT.
    unsafe {
        libc::syscall(
            SYS_futex,
            word.as_ptr(),
            op | FUTEX_PRIVATE_FLAG,
            val,
            core::ptr::null::<libc::timespec>(),
        );
    }
}

/// Wakes all threads waiting on the given address.
#[cfg(not(loom))]
#[inline]
pub(crate) fn wake_all_u32(addr: &AtomicU32) {
    #[cfg(windows)]
    // SAFETY: the address stays valid while borrowed.
    unsafe {
        WakeByAddressAll(addr.as_ptr().cast());
    }
    #[cfg(target_os = "linux")]
    futex(addr, FUTEX_WAKE, i32::MAX as u32);
    #[cfg(not(any(windows, target_os = "linux")))]
    let _ = addr;
}

/// Waits on the given address until the value changes from `expected`.
///
/// May return spuriously; callers re-check the value.
#[cfg(not(loom))]
#[inline]
pub(crate) fn wait_on_u32(addr: &AtomicU32, expected: u32) {
    #[cfg(windows)]
    // SAFETY: both addresses hold a `u32` and outlive the call.
    unsafe {
        WaitOnAddress(
            addr.as_ptr().cast(),
            core::ptr::addr_of!(expected).cast(),
            core::mem::size_of::<u32>(),
            u32::MAX,
        );
    }
    #[cfg(target_os = "linux")]
    if addr.load(Ordering::Acquire) == expected {
        futex(addr, FUTEX_WAIT, expected);
    }
    #[cfg(not(any(windows, target_os = "linux")))]
    while addr.load(Ordering::Acquire) == expected {
        std::thread::yield_now();
    }
}

#[cfg(loom)]
pub(crate) fn wake_all_u32(_addr: &AtomicU32) {}

#[cfg(loom)]
pub(crate) fn wait_on_u32(addr: &AtomicU32, expected: u32) {
    if addr.load(Ordering::Acquire) == expected {
        loom::thread::yield_now();
    }
}
