//! Synchronization primitives integrated with the scheduler.
//!
//! [`Mutex`] is a plain spin lock; [`CondVar`] parks waiters in the thread
//! table so they are skipped by the scheduler instead of burning cycles.
//! Both are freestanding values with `const` constructors, shared through
//! `Rc` among the logical threads on the single OS thread that runs them.

mod cond;
mod mutex;
mod queue;

pub use cond::CondVar;
pub use mutex::Mutex;
