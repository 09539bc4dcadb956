//! Context switch primitive.
//!
//! A [`Checkpoint`] is an opaque, move-only resumable execution point: the
//! SysV callee-saved registers plus stack pointer and instruction pointer.
//! Only this module constructs or consumes checkpoints; everything above
//! operates on TCB handles.
//!
//! [`switch`] saves the caller's resumable point and transfers to another in
//! a single call, so the call simply returns when some other thread later
//! resumes the saved checkpoint. [`resume`] transfers without saving (the
//! exit path, where the calling stack must never run again). [`forge`]
//! prepares a first-activation checkpoint on a fresh, never-executed stack:
//! the first transfer into it enters `entry` with a SysV-aligned stack and a
//! null fake return address, the same trick the runtime's trampoline relies
//! on never returning from.

use std::arch::global_asm;

/// Saved execution point: callee-saved registers, stack pointer, and the
/// address execution resumes at. Field order is the ABI contract with the
/// assembly below.
#[repr(C)]
pub(crate) struct Checkpoint {
    rbx: u64,
    rbp: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
    rsp: u64,
    rip: u64,
}

impl Checkpoint {
    /// An empty checkpoint; resuming it before it has been captured or
    /// forged is undefined, which is why only the runtime's state machine
    /// ever decides to transfer into one.
    pub(crate) const fn new() -> Self {
        Self {
            rbx: 0,
            rbp: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            rsp: 0,
            rip: 0,
        }
    }
}

// Caller-saved registers need no treatment: both routines are reached by an
// ordinary `call`, so the compiler already assumes they are clobbered. The
// saved rip is the return address of that call; the saved rsp is the stack
// pointer as it will be after the call returns.
global_asm!(
    ".text",
    ".balign 16",
    ".globl weft_context_switch",
    ".type weft_context_switch, @function",
    "weft_context_switch:",
    "mov [rdi + 0x00], rbx",
    "mov [rdi + 0x08], rbp",
    "mov [rdi + 0x10], r12",
    "mov [rdi + 0x18], r13",
    "mov [rdi + 0x20], r14",
    "mov [rdi + 0x28], r15",
    "lea rax, [rsp + 8]",
    "mov [rdi + 0x30], rax",
    "mov rax, [rsp]",
    "mov [rdi + 0x38], rax",
    "mov rbx, [rsi + 0x00]",
    "mov rbp, [rsi + 0x08]",
    "mov r12, [rsi + 0x10]",
    "mov r13, [rsi + 0x18]",
    "mov r14, [rsi + 0x20]",
    "mov r15, [rsi + 0x28]",
    "mov rsp, [rsi + 0x30]",
    "jmp qword ptr [rsi + 0x38]",
    ".size weft_context_switch, . - weft_context_switch",
    ".balign 16",
    ".globl weft_context_resume",
    ".type weft_context_resume, @function",
    "weft_context_resume:",
    "mov rbx, [rdi + 0x00]",
    "mov rbp, [rdi + 0x08]",
    "mov r12, [rdi + 0x10]",
    "mov r13, [rdi + 0x18]",
    "mov r14, [rdi + 0x20]",
    "mov r15, [rdi + 0x28]",
    "mov rsp, [rdi + 0x30]",
    "jmp qword ptr [rdi + 0x38]",
    ".size weft_context_resume, . - weft_context_resume",
);

unsafe extern "C" {
    fn weft_context_switch(save: *mut Checkpoint, load: *const Checkpoint);
    fn weft_context_resume(load: *const Checkpoint) -> !;
}

/// Saves the caller's execution point into `save` and transfers control to
/// `load`. Returns when `save` is itself resumed later.
///
/// # Safety
///
/// `save` must be valid for writes. `load` must hold a checkpoint produced
/// by a prior [`switch`] save or by [`forge`], whose stack is live and not
/// currently executing.
pub(crate) unsafe fn switch(save: *mut Checkpoint, load: *const Checkpoint) {
    unsafe { weft_context_switch(save, load) }
}

/// Transfers control to `load` without saving the caller. The calling stack
/// is abandoned; control never returns here.
///
/// # Safety
///
/// Same requirements on `load` as [`switch`].
pub(crate) unsafe fn resume(load: *const Checkpoint) -> ! {
    unsafe { weft_context_resume(load) }
}

/// Builds a checkpoint whose first resumption enters `entry` on the stack
/// ending at `stack_top`.
///
/// The frame mimics the state just after a `call`: `rsp % 16 == 8` and a
/// (null) return address at `[rsp]`. `entry` must never return through it.
///
/// # Safety
///
/// `stack_top` must be the one-past-the-end pointer of a writable stack
/// region at least one page long, unused by any live checkpoint.
pub(crate) unsafe fn forge(stack_top: *mut u8, entry: extern "C" fn() -> !) -> Checkpoint {
    let top = (stack_top as usize) & !0xF;
    let sp = top - 8;
    // Fake return address; entry diverges so it is never popped.
    unsafe { (sp as *mut u64).write(0) };
    let mut checkpoint = Checkpoint::new();
    checkpoint.rsp = sp as u64;
    checkpoint.rip = entry as usize as u64;
    checkpoint
}
