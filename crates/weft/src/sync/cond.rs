//! Condition variable.

use std::cell::RefCell;

use crate::runtime;
use crate::sync::Mutex;
use crate::sync::queue::WaitQueue;

/// Scheduler-integrated condition variable.
///
/// Waiters park themselves as `Blocked` and yield, so they consume no
/// processor time while waiting; `signal` wakes them in strict FIFO order.
/// An internal spin mutex keeps the wait queue and the park/unpark state
/// transitions atomic against preemption and against concurrent signals.
///
/// As with any condition variable, a waiter must re-check its predicate
/// after `wait` returns: by the time it reacquires the user mutex, another
/// thread may have consumed the condition.
pub struct CondVar {
    internal: Mutex,
    // Only borrowed inside `internal`'s critical sections, which contain no
    // suspension point, so a borrow can never be live across a switch.
    waiters: RefCell<WaitQueue>,
}

impl CondVar {
    pub const fn new() -> Self {
        Self {
            internal: Mutex::new(),
            waiters: RefCell::new(WaitQueue::new()),
        }
    }

    /// Atomically releases `user`, parks the caller until signaled, then
    /// reacquires `user` before returning.
    ///
    /// The caller must hold `user`; enqueue, park, and the release of `user`
    /// all happen under the internal mutex, so a signal sent after `user` is
    /// released can never miss this waiter.
    pub fn wait(&self, user: &Mutex) {
        runtime::preempt_shield();
        self.internal.lock();
        self.waiters.borrow_mut().push_tail(runtime::current());
        runtime::block_current();
        user.unlock();
        self.internal.unlock();
        runtime::preempt_unshield();
        while runtime::current_is_blocked() {
            if !runtime::yield_now() {
                runtime::fatal("condition wait with no runnable thread to signal it");
            }
        }
        user.lock();
    }

    /// Wakes the longest-waiting thread, if any. Returns whether a waiter
    /// was woken. The woken thread still reacquires the user mutex before
    /// its `wait` returns, so calling this with or without that mutex held
    /// are both sound.
    pub fn signal(&self) -> bool {
        runtime::preempt_shield();
        self.internal.lock();
        let head = self.waiters.borrow_mut().pop_head();
        let woke = match head {
            Some(id) => {
                runtime::unblock(id);
                true
            }
            None => false,
        };
        self.internal.unlock();
        runtime::preempt_unshield();
        woke
    }

    /// Wakes every current waiter. Threads that start waiting during the
    /// drain are not woken by this call.
    pub fn broadcast(&self) {
        while self.signal() {}
    }

    /// Whether any thread is currently parked on this variable.
    pub fn has_waiters(&self) -> bool {
        runtime::preempt_shield();
        self.internal.lock();
        let waiting = !self.waiters.borrow().is_empty();
        self.internal.unlock();
        runtime::preempt_unshield();
        waiting
    }
}

impl Default for CondVar {
    fn default() -> Self {
        Self::new()
    }
}
