//! Runtime error taxonomy.
//!
//! Recoverable misuse (capacity exhaustion, bad join targets, lifecycle
//! ordering) is reported through [`RuntimeError`]. A condition signal with
//! no waiter is a normal outcome, not an error, and is reported as a plain
//! `false` by [`crate::sync::CondVar::signal`].

use crate::runtime::ThreadId;

/// Errors reported by the runtime's public operations.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// `init` was called while a runtime is already live in this process.
    #[error("runtime already initialized")]
    AlreadyInitialized,

    /// An operation was invoked before `init` (or after `shutdown`).
    #[error("runtime not initialized")]
    NotInitialized,

    /// No `Invalid` slot remains in the thread table. The table never
    /// grows and finished slots are not reclaimed.
    #[error("thread table is full")]
    CapacityExceeded,

    /// The target id is out of range or names a slot that was never created.
    #[error("thread {0} is not a valid target")]
    InvalidThread(ThreadId),

    /// A thread attempted to join itself.
    #[error("a thread cannot join itself")]
    JoinSelf,

    /// The target already has a recorded joiner; at most one thread may
    /// wait on a given thread's exit.
    #[error("thread {0} already has a joiner")]
    AlreadyJoined(ThreadId),

    /// `shutdown` must run on the main thread (id 0).
    #[error("shutdown must be called from the main thread")]
    ShutdownOffMain,

    /// `shutdown` was called while other threads are still active or blocked.
    #[error("threads are still active or blocked")]
    ThreadsStillLive,

    /// The supplied `RuntimeConfig` is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// An OS-level call (mmap, sigaction, setitimer) failed during setup.
    #[error("os error: {0}")]
    Os(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_thread() {
        assert_eq!(
            RuntimeError::InvalidThread(7).to_string(),
            "thread 7 is not a valid target"
        );
        assert_eq!(
            RuntimeError::AlreadyJoined(3).to_string(),
            "thread 3 already has a joiner"
        );
    }

    #[test]
    fn os_errors_convert_from_io() {
        let err: RuntimeError = std::io::Error::from_raw_os_error(libc::EINVAL).into();
        assert!(matches!(err, RuntimeError::Os(_)));
    }
}
