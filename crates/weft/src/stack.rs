//! Fixed stack arena.
//!
//! All thread stacks live in a single anonymous mapping allocated at
//! initialization: `capacity` slots of `guard page + stack`, indexed by
//! thread id. Each slot's lowest page is `PROT_NONE` so an overflow faults
//! instead of silently corrupting the neighboring stack. Slots are never
//! individually freed; the whole region is unmapped when the runtime shuts
//! down.

use std::io;
use std::ptr;

use crate::error::RuntimeError;

pub(crate) struct StackArena {
    base: *mut u8,
    total: usize,
    slot_span: usize,
    guard: usize,
    capacity: usize,
}

impl StackArena {
    /// Maps `capacity` stack slots of at least `stack_size` usable bytes
    /// each (rounded up to whole pages), with one guard page below each.
    pub(crate) fn allocate(capacity: usize, stack_size: usize) -> Result<Self, RuntimeError> {
        let page = page_size();
        let stack = stack_size.div_ceil(page) * page;
        let slot_span = page + stack;
        let total = slot_span
            .checked_mul(capacity)
            .ok_or(RuntimeError::InvalidConfig("stack arena size overflows"))?;

        // SAFETY: anonymous private mapping, no fd, freshly chosen address.
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                total,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(RuntimeError::Os(io::Error::last_os_error()));
        }
        let base = base.cast::<u8>();

        for slot in 0..capacity {
            // SAFETY: each guard page lies inside the mapping created above.
            let rc = unsafe {
                libc::mprotect(base.add(slot * slot_span).cast(), page, libc::PROT_NONE)
            };
            if rc != 0 {
                let err = io::Error::last_os_error();
                // SAFETY: unmapping the region we just mapped.
                unsafe { libc::munmap(base.cast(), total) };
                return Err(RuntimeError::Os(err));
            }
        }

        Ok(Self {
            base,
            total,
            slot_span,
            guard: page,
            capacity,
        })
    }

    /// One-past-the-end pointer of slot `id`'s usable stack (stacks grow
    /// down). Page-aligned by construction.
    pub(crate) fn stack_top(&self, id: usize) -> *mut u8 {
        debug_assert!(id < self.capacity);
        // SAFETY: id is bounded by capacity, so the offset stays inside the
        // mapping (the result is the exclusive end of slot `id`).
        unsafe { self.base.add(id * self.slot_span + self.slot_span) }
    }

    /// Usable bytes per slot.
    pub(crate) fn usable_size(&self) -> usize {
        self.slot_span - self.guard
    }
}

impl Drop for StackArena {
    fn drop(&mut self) {
        // SAFETY: base/total describe the mapping made in `allocate`.
        unsafe { libc::munmap(self.base.cast(), self.total) };
    }
}

fn page_size() -> usize {
    // SAFETY: sysconf with a valid name has no memory effects.
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page <= 0 { 4096 } else { page as usize }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_distinct_and_page_aligned() {
        let arena = StackArena::allocate(4, 64 * 1024).unwrap();
        let page = page_size();
        let tops: Vec<usize> = (0..4).map(|id| arena.stack_top(id) as usize).collect();
        for window in tops.windows(2) {
            assert_eq!(window[1] - window[0], arena.slot_span);
        }
        for top in tops {
            assert_eq!(top % page, 0);
        }
        assert!(arena.usable_size() >= 64 * 1024);
    }

    #[test]
    fn stack_size_is_rounded_up_to_pages() {
        let arena = StackArena::allocate(2, 100).unwrap();
        assert_eq!(arena.usable_size() % page_size(), 0);
        assert!(arena.usable_size() >= 100);
    }

    #[test]
    fn stacks_are_writable_below_the_top() {
        let arena = StackArena::allocate(2, 16 * 1024).unwrap();
        let top = arena.stack_top(1);
        // SAFETY: the word below the top lies in slot 1's usable stack.
        unsafe {
            let word = top.sub(8).cast::<u64>();
            word.write(0xFEED_FACE);
            assert_eq!(word.read(), 0xFEED_FACE);
        }
    }

    #[test]
    fn overflowing_arena_is_rejected() {
        assert!(matches!(
            StackArena::allocate(usize::MAX / 2, usize::MAX / 2),
            Err(RuntimeError::InvalidConfig(_))
        ));
    }
}
