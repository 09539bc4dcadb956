//! Preemption driver.
//!
//! When enabled, a one-shot `ITIMER_REAL` quantum delivers `SIGALRM` and the
//! handler forces a [`crate::runtime::yield_now`]. The timer is re-armed at
//! every resumption point, so the switch region runs with no live quantum.
//! Shielding additionally blocks `SIGALRM` with `pthread_sigmask`: zeroing
//! the timer does not clear a signal that is already pending, and the switch
//! must be atomic with respect to re-entrant interrupts.
//!
//! The runtime is owned by the OS thread that called `init`. Under a
//! multi-threaded host (the test harness), the process-directed `SIGALRM`
//! may land on a foreign thread; the handler redirects it to the owner with
//! `pthread_kill` and returns.

use std::io;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::RuntimeError;

/// pthread id of the OS thread that owns the runtime, as a plain word.
static OWNER: AtomicUsize = AtomicUsize::new(0);

extern "C" fn on_alarm(_signum: libc::c_int) {
    let owner = OWNER.load(Ordering::Relaxed) as libc::pthread_t;
    // SAFETY: pthread_self has no preconditions; pthread_kill targets the
    // recorded owner thread, which outlives the armed timer.
    let this = unsafe { libc::pthread_self() };
    if this != owner {
        unsafe {
            libc::pthread_kill(owner, libc::SIGALRM);
        }
        return;
    }
    crate::runtime::yield_now();
}

/// Timer-forced yield driver. All operations are no-ops when the runtime
/// was initialized without preemption.
pub(crate) struct Preemption {
    quantum: Option<Duration>,
}

impl Preemption {
    pub(crate) fn new(quantum: Option<Duration>) -> Self {
        Self { quantum }
    }

    /// Installs the `SIGALRM` handler and records the owning OS thread.
    /// Must run before the timer is first armed.
    pub(crate) fn install(&self) -> Result<(), RuntimeError> {
        if self.quantum.is_none() {
            return Ok(());
        }
        // SAFETY: pthread_self has no preconditions.
        OWNER.store(unsafe { libc::pthread_self() } as usize, Ordering::Relaxed);

        let handler: extern "C" fn(libc::c_int) = on_alarm;
        // SAFETY: zeroed sigaction is a valid all-defaults template; the
        // handler pointer stays valid for the life of the process.
        unsafe {
            let mut action = mem::zeroed::<libc::sigaction>();
            action.sa_sigaction = handler as usize;
            action.sa_flags = libc::SA_NODEFER;
            libc::sigemptyset(&mut action.sa_mask);
            if libc::sigaction(libc::SIGALRM, &action, ptr::null_mut()) != 0 {
                return Err(RuntimeError::Os(io::Error::last_os_error()));
            }
        }
        Ok(())
    }

    /// Starts (or restarts) the quantum. Called at init and at every
    /// resumption point.
    pub(crate) fn arm(&self) {
        if let Some(quantum) = self.quantum {
            set_timer(Some(quantum));
        }
    }

    /// Makes the upcoming switch atomic: block `SIGALRM`, then kill the
    /// quantum.
    pub(crate) fn shield(&self) {
        if self.quantum.is_some() {
            set_mask(libc::SIG_BLOCK);
            set_timer(None);
        }
    }

    /// Re-enables preemption once control has returned to a resumed thread.
    pub(crate) fn unshield(&self) {
        if self.quantum.is_some() {
            set_timer(self.quantum);
            set_mask(libc::SIG_UNBLOCK);
        }
    }

    /// Quiesces the driver at shutdown: no quantum, mask restored.
    pub(crate) fn clear(&self) {
        if self.quantum.is_some() {
            set_timer(None);
            set_mask(libc::SIG_UNBLOCK);
        }
    }
}

fn set_timer(quantum: Option<Duration>) {
    let value = match quantum {
        Some(q) => {
            let sec = q.as_secs() as libc::time_t;
            let mut usec = q.subsec_micros() as libc::suseconds_t;
            if sec == 0 && usec == 0 {
                usec = 1;
            }
            libc::timeval {
                tv_sec: sec,
                tv_usec: usec,
            }
        }
        None => libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
    };
    let timer = libc::itimerval {
        it_interval: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
        it_value: value,
    };
    // SAFETY: setitimer with a valid itimerval and no out-parameter.
    unsafe {
        libc::setitimer(libc::ITIMER_REAL, &timer, ptr::null_mut());
    }
}

fn set_mask(how: libc::c_int) {
    // SAFETY: locally built sigset, current thread's mask only.
    unsafe {
        let mut set = mem::zeroed::<libc::sigset_t>();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGALRM);
        libc::pthread_sigmask(how, &set, ptr::null_mut());
    }
}
