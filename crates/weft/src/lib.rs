//! # weft
//!
//! A user-level (green) threading runtime: many logical threads multiplexed
//! onto the one OS thread that initialized it, with hand-rolled context
//! switching, a fixed-capacity round-robin scheduler, optional timer-driven
//! preemption, and scheduler-integrated synchronization primitives.
//!
//! Scheduling is cooperative by default: control moves at [`yield_now`],
//! [`join`], [`exit`], and condition waits. Enabling preemption in
//! [`RuntimeConfig`] arms a timer that forces a yield each quantum.
//!
//! ```
//! let config = weft::RuntimeConfig {
//!     max_threads: 8,
//!     ..Default::default()
//! };
//! weft::init(config).unwrap();
//!
//! let worker = weft::create(|| 41 + 1).unwrap();
//! assert_eq!(weft::join(worker).unwrap(), 42);
//!
//! weft::shutdown().unwrap();
//! ```
//!
//! Because everything runs on one OS thread, entry closures need no `Send`
//! bound and may share state through `Rc<Cell<_>>` and friends. The
//! scheduler itself is not thread-safe: all calls must come from the OS
//! thread that called [`init`].

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
compile_error!("weft supports x86_64 Linux only (SysV context switching and POSIX interval timers)");

mod config;
#[allow(unsafe_code)]
mod context;
mod error;
#[allow(unsafe_code)]
mod preempt;
#[allow(unsafe_code)]
mod runtime;
#[allow(unsafe_code)]
mod stack;
pub mod sync;

pub use config::{DEFAULT_MAX_THREADS, DEFAULT_QUANTUM, DEFAULT_STACK_SIZE, RuntimeConfig};
pub use error::RuntimeError;
pub use runtime::{
    ThreadId, ThreadState, create, current, exit, init, join, shutdown, state_of, yield_now,
};
