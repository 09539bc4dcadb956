//! Spin mutex.

use std::hint;
use std::sync::atomic::{AtomicBool, Ordering};

/// Test-and-set spin lock over the scheduler's threads.
///
/// Unowned by design: `unlock` releases regardless of which thread locked,
/// which is what lets a condition wait release the caller's mutex on its
/// behalf. The flip side is that unlocking a mutex some other thread holds
/// is a logic error this type cannot detect.
///
/// A spinning thread makes progress only because the scheduler keeps running
/// it alongside the holder; under cooperative scheduling the holder must
/// yield or the spinner starves the table. Critical sections should stay
/// short.
pub struct Mutex {
    locked: AtomicBool,
}

impl Mutex {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Spins until the lock is acquired. Test-and-test-and-set: read until
    /// the flag looks free, then race one compare-exchange for it.
    pub fn lock(&self) {
        loop {
            while self.locked.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
            if self
                .locked
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Releases the lock. Callers are trusted to hold it (see the type-level
    /// note on unowned unlocking).
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    /// Snapshot of the flag; meaningful for assertions, not for control
    /// flow, since the answer can be stale by the time it is read.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}
