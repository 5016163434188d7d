//! Blocking mutex (C8).
//!
//! A `Mutex` is two things: a single lock byte tested and set atomically
//! (the architectural primitive `try_acquire_atomic` from the original
//! kernel), and a wait queue of tasks parked on it. The blocking protocol
//! itself — loop, deposit `WaitMutex`, sleep, get woken by `unlock` — needs
//! the running task and the scheduler's task pool, so it lives in
//! [`crate::scheduler`]; this module only owns the data the protocol acts on.
//!
//! Every mutex the kernel knows about is a `'static` object, exactly as in
//! the original kernel where mutexes are always statically allocated, never
//! heap objects. That's what lets [`crate::message::MessageParam::Mutex`]
//! hold a plain `&'static Mutex` instead of a raw pointer.

use core::cell::UnsafeCell;
use portable_atomic::{AtomicBool, Ordering};

use crate::list::List;

/// A mutex: one lock bit plus the queue of tasks waiting to acquire it.
pub struct Mutex {
    locked: AtomicBool,
    waiters: UnsafeCell<List>,
}

// SAFETY: `locked` is accessed through atomic operations only. `waiters` is
// mutated solely by the scheduler (`waiters_mut`), and only ever from tick-ISR
// or interrupts-disabled context, which the caller of `waiters_mut` must
// uphold; see that method's safety comment.
unsafe impl Sync for Mutex {}

impl Mutex {
    /// A mutex that starts out unlocked.
    pub const fn new() -> Self {
        Mutex {
            locked: AtomicBool::new(false),
            waiters: UnsafeCell::new(List::new()),
        }
    }

    /// A mutex that starts out locked, for the common pattern of a resource
    /// that must be explicitly released once before first use.
    pub const fn new_locked() -> Self {
        Mutex {
            locked: AtomicBool::new(true),
            waiters: UnsafeCell::new(List::new()),
        }
    }

    /// The architectural test-and-set primitive: atomically claims the lock
    /// if it was free, and reports whether the claim succeeded. Safe to call
    /// from any context, including with interrupts enabled, since it is a
    /// single atomic read-modify-write.
    pub fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Unconditionally frees the lock. The caller (the scheduler's unlock
    /// path) is responsible for waking parked tasks afterwards.
    pub fn release(&self) {
        self.locked.store(false, Ordering::Release);
    }

    /// Grants scheduler code access to the wait queue.
    ///
    /// # Safety
    ///
    /// The caller must hold the invariant that all mutations to a mutex's
    /// wait queue happen with interrupts disabled or from the tick ISR,
    /// exactly as for any other scheduler queue (see the concurrency model).
    pub unsafe fn waiters_mut(&self) -> &mut List {
        &mut *self.waiters.get()
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_acquire_succeeds_once_then_fails_until_released() {
        let mutex = Mutex::new();
        assert!(mutex.try_acquire());
        assert!(!mutex.try_acquire());
        mutex.release();
        assert!(mutex.try_acquire());
    }

    #[test]
    fn new_locked_starts_unavailable() {
        let mutex = Mutex::new_locked();
        assert!(!mutex.try_acquire());
        mutex.release();
        assert!(mutex.try_acquire());
    }
}
