//! Atomics and cell shim: `loom` under `cfg(loom)`, `std` otherwise.
//!
//! Slot values go through [`UnsafeCell::with`]/[`UnsafeCell::with_mut`] so
//! loom can check that every read of a value is ordered after its write.

#[cfg(not(loom))]
pub(crate) use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[cfg(loom)]
pub(crate) use loom::cell::UnsafeCell;

/// `std::cell::UnsafeCell` with loom's closure-based access API
#[cfg(not(loom))]
#[derive(Debug)]
pub(crate) struct UnsafeCell<T>(std::cell::UnsafeCell<T>);

#[cfg(not(loom))]
impl<T> UnsafeCell<T> {
    #[inline(always)]
    pub(crate) const fn new(data: T) -> Self {
        Self(std::cell::UnsafeCell::new(data))
    }

    #[inline(always)]
    pub(crate) fn with<R>(&self, f: impl FnOnce(*const T) -> R) -> R {
        f(self.0.get())
    }

    #[inline(always)]
    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
        f(self.0.get())
    }
}

#[cfg(not(loom))]
#[inline(always)]
pub(crate) fn spin_loop() {
    std::hint::spin_loop();
}

#[cfg(loom)]
#[inline(always)]
pub(crate) fn spin_loop() {
    loom::thread::yield_now();
}

/// Spins issued before a waiting loop starts yielding its time slice
pub(crate) const SPIN_LIMIT: u64 = 64;

/// Wait step for the `spins`-th failed attempt: a CPU spin hint at first,
/// then a thread yield so a descheduled peer can run.
#[inline]
pub(crate) fn backoff(spins: u64) {
    if spins < SPIN_LIMIT {
        spin_loop();
    } else {
        #[cfg(not(loom))]
        std::thread::yield_now();
        #[cfg(loom)]
        loom::thread::yield_now();
    }
}
