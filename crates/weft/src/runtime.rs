//! Thread table and round-robin scheduler.
//!
//! One process-wide [`Runtime`] owns the fixed-capacity table of thread
//! control blocks, the stack arena, and the preemption driver. Client code
//! never touches TCB fields; the only mutation paths are the public
//! operations below plus the crate-internal state hooks used by the
//! synchronization layer.
//!
//! ## Lifecycle
//!
//! `Invalid → Active` on [`create`], `→ Blocked` on join-wait or
//! condition-wait, `→ Active` on being unblocked, `→ Finished` on exit
//! (terminal). `Active` is the only schedulable state. Finished slots are
//! never reclaimed: thread identities are one-shot, and a program that
//! creates many short-lived threads must size `max_threads` accordingly.
//!
//! ## Execution model
//!
//! Every logical thread runs on the single OS thread that called [`init`];
//! entry closures therefore need no `Send` bound, and captures may use
//! `Rc`/`Cell` freely. A switch happens only at an explicit [`yield_now`],
//! inside [`join`], inside [`exit`], inside a condition wait, or when the
//! preemption quantum fires.

use std::cell::UnsafeCell;
use std::process;

use crate::config::RuntimeConfig;
use crate::context::{self, Checkpoint};
use crate::error::RuntimeError;
use crate::preempt::Preemption;
use crate::stack::StackArena;

/// Stable numeric identity of a logical thread: its table slot.
pub type ThreadId = usize;

/// Slot 0 is reserved for the bootstrap/main thread.
pub(crate) const MAIN_THREAD: ThreadId = 0;

/// Lifecycle state of a table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Never created (or reset at init). The only state `create` claims.
    Invalid,
    /// Eligible for scheduling.
    Active,
    /// Waiting on a join or a condition variable; skipped by the scheduler
    /// until explicitly reactivated.
    Blocked,
    /// Exited. Terminal; the slot is not reused.
    Finished,
}

type Entry = Box<dyn FnOnce() -> usize>;

/// Thread control block. Owned exclusively by the runtime's table.
struct Tcb {
    checkpoint: Checkpoint,
    entry: Option<Entry>,
    result: Option<usize>,
    state: ThreadState,
    joiner: Option<ThreadId>,
}

impl Tcb {
    fn vacant() -> Self {
        Self {
            checkpoint: Checkpoint::new(),
            entry: None,
            result: None,
            state: ThreadState::Invalid,
            joiner: None,
        }
    }
}

pub(crate) struct Runtime {
    table: Vec<Tcb>,
    stacks: StackArena,
    current: ThreadId,
    preempt: Preemption,
}

impl Runtime {
    /// Round-robin pick: first `Active` slot after `current`, wrapping,
    /// never the caller itself.
    fn next_active(&self) -> Option<ThreadId> {
        let len = self.table.len();
        (1..len)
            .map(|offset| (self.current + offset) % len)
            .find(|&id| self.table[id].state == ThreadState::Active)
    }

    fn create_inner(&mut self, entry: Entry) -> Result<ThreadId, RuntimeError> {
        let id = (1..self.table.len())
            .find(|&id| self.table[id].state == ThreadState::Invalid)
            .ok_or(RuntimeError::CapacityExceeded)?;
        let top = self.stacks.stack_top(id);
        let tcb = &mut self.table[id];
        tcb.entry = Some(entry);
        tcb.result = None;
        tcb.joiner = None;
        // SAFETY: slot `id` was Invalid, so its arena stack has no live
        // checkpoint on it.
        tcb.checkpoint = unsafe { context::forge(top, trampoline) };
        // Written last: the scheduler scan keys on state alone, so a
        // preemption mid-create never exposes a half-installed slot.
        tcb.state = ThreadState::Active;
        Ok(id)
    }
}

struct RuntimeCell(UnsafeCell<Option<Runtime>>);

// SAFETY: the runtime is only ever touched from the OS thread that called
// `init` (the preemption handler redirects foreign deliveries there), and
// test harnesses that reinitialize it across OS threads serialize on an
// external lock.
unsafe impl Sync for RuntimeCell {}

static RUNTIME: RuntimeCell = RuntimeCell(UnsafeCell::new(None));

fn runtime_ref() -> Option<&'static mut Runtime> {
    // SAFETY: single-OS-thread access discipline, see `RuntimeCell`.
    unsafe { (*RUNTIME.0.get()).as_mut() }
}

/// Unrecoverable scheduler state: report and abort. Unwinding is not an
/// option once stacks are being switched by hand.
pub(crate) fn fatal(msg: &str) -> ! {
    eprintln!("weft: fatal: {msg}");
    process::abort();
}

/// First activation point of every created thread. Entered exactly once per
/// slot via the forged checkpoint; runs the stored entry closure and exits
/// with its return value.
extern "C" fn trampoline() -> ! {
    let entry = {
        let Some(rt) = runtime_ref() else {
            fatal("thread activated without a runtime");
        };
        rt.preempt.unshield();
        let id = rt.current;
        match rt.table[id].entry.take() {
            Some(entry) => entry,
            None => fatal("thread activated without an entry"),
        }
    };
    let result = entry();
    exit(result)
}

/// Initializes the process-wide runtime: allocates the stack arena, builds
/// the table with the calling thread as slot 0, installs the preemption
/// handler, and arms the first quantum when preemption is enabled.
///
/// All other operations must be called from the same OS thread.
pub fn init(config: RuntimeConfig) -> Result<(), RuntimeError> {
    config.validate()?;
    // SAFETY: single-OS-thread access discipline, see `RuntimeCell`.
    let slot = unsafe { &mut *RUNTIME.0.get() };
    if slot.is_some() {
        return Err(RuntimeError::AlreadyInitialized);
    }
    let stacks = StackArena::allocate(config.max_threads, config.stack_size)?;
    debug_assert!(stacks.usable_size() >= config.stack_size);
    let preempt = Preemption::new(config.preemption.then_some(config.quantum));
    preempt.install()?;
    let mut table: Vec<Tcb> = (0..config.max_threads).map(|_| Tcb::vacant()).collect();
    table[MAIN_THREAD].state = ThreadState::Active;
    *slot = Some(Runtime {
        table,
        stacks,
        current: MAIN_THREAD,
        preempt,
    });
    if let Some(rt) = slot.as_ref() {
        rt.preempt.arm();
    }
    Ok(())
}

/// Tears the runtime down. Main thread only, and only once every other
/// slot has finished; the arena is unmapped and a later [`init`] starts
/// fresh.
pub fn shutdown() -> Result<(), RuntimeError> {
    // SAFETY: single-OS-thread access discipline, see `RuntimeCell`.
    let slot = unsafe { &mut *RUNTIME.0.get() };
    let rt = slot.as_mut().ok_or(RuntimeError::NotInitialized)?;
    if rt.current != MAIN_THREAD {
        return Err(RuntimeError::ShutdownOffMain);
    }
    let live = rt.table.iter().enumerate().any(|(id, tcb)| {
        id != MAIN_THREAD && matches!(tcb.state, ThreadState::Active | ThreadState::Blocked)
    });
    if live {
        return Err(RuntimeError::ThreadsStillLive);
    }
    rt.preempt.clear();
    *slot = None;
    Ok(())
}

/// Creates a logical thread. It does not run until some thread yields into
/// it; the returned id is stable for the thread's lifetime and never
/// reused.
pub fn create<F>(entry: F) -> Result<ThreadId, RuntimeError>
where
    F: FnOnce() -> usize + 'static,
{
    let rt = runtime_ref().ok_or(RuntimeError::NotInitialized)?;
    rt.preempt.shield();
    let created = rt.create_inner(Box::new(entry));
    rt.preempt.unshield();
    created
}

/// Hands the processor to the next `Active` thread in round-robin order.
/// Returns `false` (caller keeps running) only when no other `Active`
/// thread exists.
pub fn yield_now() -> bool {
    let Some(rt) = runtime_ref() else {
        return false;
    };
    rt.preempt.shield();
    let Some(target) = rt.next_active() else {
        rt.preempt.unshield();
        return false;
    };
    let from = rt.current;
    rt.current = target;
    // SAFETY: the table is pinned for the runtime's lifetime; `target` is
    // Active and suspended, so its checkpoint is resumable.
    unsafe {
        let table = rt.table.as_mut_ptr();
        context::switch(
            &raw mut (*table.add(from)).checkpoint,
            &raw const (*table.add(target)).checkpoint,
        );
    }
    // Some thread switched back into us; preemption resumes here.
    if let Some(rt) = runtime_ref() {
        rt.preempt.unshield();
    }
    true
}

enum JoinPath {
    /// The call completes without blocking: an error, or a `Finished`
    /// target's stored result.
    Done(Result<usize, RuntimeError>),
    /// The target is live; the caller must block.
    Wait,
}

fn join_precheck(rt: &Runtime, target: ThreadId) -> JoinPath {
    if target >= rt.table.len() || rt.table[target].state == ThreadState::Invalid {
        return JoinPath::Done(Err(RuntimeError::InvalidThread(target)));
    }
    if target == rt.current {
        return JoinPath::Done(Err(RuntimeError::JoinSelf));
    }
    if rt.table[target].state == ThreadState::Finished {
        return JoinPath::Done(
            rt.table[target]
                .result
                .ok_or(RuntimeError::InvalidThread(target)),
        );
    }
    if rt.table[target].joiner.is_some() {
        return JoinPath::Done(Err(RuntimeError::AlreadyJoined(target)));
    }
    JoinPath::Wait
}

/// Blocks the caller until `target` exits, then returns the value `target`
/// exited with.
///
/// Call-order contract: a `Finished` target returns its stored result
/// immediately; an `Active` target gets a direct handoff (the caller blocks
/// and the target runs at once); a `Blocked` target leaves the caller
/// blocked while some other `Active` thread runs. At most one thread may
/// join a given target.
pub fn join(target: ThreadId) -> Result<usize, RuntimeError> {
    let rt = runtime_ref().ok_or(RuntimeError::NotInitialized)?;
    // Shield before validating: a quantum between the state checks and the
    // block below could let the target finish unseen.
    rt.preempt.shield();
    if let JoinPath::Done(outcome) = join_precheck(rt, target) {
        rt.preempt.unshield();
        return outcome;
    }
    let caller = rt.current;
    rt.table[caller].state = ThreadState::Blocked;
    rt.table[target].joiner = Some(caller);
    let next = if rt.table[target].state == ThreadState::Active {
        target
    } else {
        match rt.next_active() {
            Some(id) => id,
            None => fatal("join on a blocked thread with no runnable thread"),
        }
    };
    rt.current = next;
    // SAFETY: as in `yield_now`; `next` is Active and suspended.
    unsafe {
        let table = rt.table.as_mut_ptr();
        context::switch(
            &raw mut (*table.add(caller)).checkpoint,
            &raw const (*table.add(next)).checkpoint,
        );
    }
    // Only the target's exit reactivates us, so its result is in place.
    let rt = runtime_ref().ok_or(RuntimeError::NotInitialized)?;
    rt.preempt.unshield();
    rt.table[target]
        .result
        .ok_or(RuntimeError::InvalidThread(target))
}

/// Terminates the calling thread with `result`, waking its joiner if one is
/// recorded. Never returns; the calling stack is abandoned.
///
/// Threads that return normally from their entry closure exit with the
/// returned value automatically; `exit` is for leaving early.
pub fn exit(result: usize) -> ! {
    let Some(rt) = runtime_ref() else {
        fatal("exit outside an initialized runtime");
    };
    rt.preempt.shield();
    let caller = rt.current;
    rt.table[caller].state = ThreadState::Finished;
    rt.table[caller].result = Some(result);
    let next = if let Some(joiner) = rt.table[caller].joiner {
        rt.table[joiner].state = ThreadState::Active;
        joiner
    } else if let Some(id) = rt.next_active() {
        id
    } else {
        fatal("no runnable thread after exit");
    };
    rt.current = next;
    // SAFETY: `next` is Active and suspended; the exiting stack is never
    // saved, so nothing can transfer back here.
    unsafe {
        let table = rt.table.as_mut_ptr();
        context::resume(&raw const (*table.add(next)).checkpoint);
    }
}

/// Identity of the calling thread (0 before [`init`]).
pub fn current() -> ThreadId {
    runtime_ref().map_or(MAIN_THREAD, |rt| rt.current)
}

/// Lifecycle state of `target`.
pub fn state_of(target: ThreadId) -> Result<ThreadState, RuntimeError> {
    let rt = runtime_ref().ok_or(RuntimeError::NotInitialized)?;
    match rt.table.get(target) {
        Some(tcb) => Ok(tcb.state),
        None => Err(RuntimeError::InvalidThread(target)),
    }
}

/// Marks the caller `Blocked` without switching; the synchronization layer
/// yields afterwards, once its queues and mutexes are consistent.
pub(crate) fn block_current() {
    if let Some(rt) = runtime_ref() {
        let id = rt.current;
        rt.table[id].state = ThreadState::Blocked;
    }
}

/// Reactivates a thread parked by [`block_current`]. A stale or finished id
/// is ignored.
pub(crate) fn unblock(id: ThreadId) {
    if let Some(rt) = runtime_ref()
        && let Some(tcb) = rt.table.get_mut(id)
        && tcb.state == ThreadState::Blocked
    {
        tcb.state = ThreadState::Active;
    }
}

/// The synchronization layer brackets its queue critical sections with the
/// shield so a quantum cannot fire while a condvar's internal lock is held.
/// With every holder shielded, a contender can never meet a lock whose
/// holder is suspended.
pub(crate) fn preempt_shield() {
    if let Some(rt) = runtime_ref() {
        rt.preempt.shield();
    }
}

pub(crate) fn preempt_unshield() {
    if let Some(rt) = runtime_ref() {
        rt.preempt.unshield();
    }
}

/// Whether the caller is still parked (used by condition wait to decide if
/// another yield pass is needed).
pub(crate) fn current_is_blocked() -> bool {
    runtime_ref().is_some_and(|rt| rt.table[rt.current].state == ThreadState::Blocked)
}
