//! FIFO queue of parked thread ids.

use std::collections::VecDeque;

use crate::runtime::ThreadId;

/// Wakeup order is strict arrival order; a waiter appears at most once
/// because a thread parks itself and cannot wait twice concurrently.
#[derive(Default)]
pub(crate) struct WaitQueue {
    items: VecDeque<ThreadId>,
}

impl WaitQueue {
    pub(crate) const fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub(crate) fn push_tail(&mut self, id: ThreadId) {
        self.items.push_back(id);
    }

    pub(crate) fn pop_head(&mut self) -> Option<ThreadId> {
        self.items.pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
