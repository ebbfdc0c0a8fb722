//! # Thread Control Block
//!
//! Defines the per-thread state record and the initial stack frame each
//! thread needs before its first context switch.
//!
//! TCBs are stored in a fixed array inside the scheduler and linked into a
//! ring by index. The ring is built once, in declaration order, when the
//! threads are registered, and never reordered. A thread is *ready* when it
//! is neither blocked on a semaphore nor sleeping.

use crate::config::{MAX_PRIORITY, STACK_WORDS};
use crate::semaphore::SemaphoreId;

/// Thread entry point. Threads never return.
pub type ThreadEntry = extern "C" fn() -> !;

/// Number of words in the initial exception frame (8 hardware-stacked
/// plus 8 software-saved registers).
pub const FRAME_WORDS: usize = 16;

/// Initial xPSR: only the Thumb bit is set.
pub const INITIAL_XPSR: u32 = 0x0100_0000;

/// Initial LR. Threads never return, so it only needs to be recognizable.
pub const INITIAL_LR: u32 = 0x1414_1414;

// ---------------------------------------------------------------------------
// Thread description (input to registration)
// ---------------------------------------------------------------------------

/// Static description of a thread, supplied at registration time.
#[derive(Debug, Clone, Copy)]
pub struct ThreadSpec {
    /// Entry function.
    pub entry: ThreadEntry,
    /// Static priority; lower is more urgent. Ignored by the round-robin
    /// policies.
    pub priority: u8,
}

impl ThreadSpec {
    /// A thread at the highest priority (0).
    pub const fn new(entry: ThreadEntry) -> Self {
        Self { entry, priority: 0 }
    }

    /// A thread with an explicit priority.
    pub const fn with_priority(entry: ThreadEntry, priority: u8) -> Self {
        Self { entry, priority }
    }

    /// Whether the priority lies within `0..=MAX_PRIORITY`.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.priority <= MAX_PRIORITY
    }
}

// ---------------------------------------------------------------------------
// Stack
// ---------------------------------------------------------------------------

/// Per-thread stack memory. Aligned to 8 bytes as required by ARM AAPCS.
#[derive(Clone, Copy)]
#[repr(C, align(8))]
pub struct Stack(pub [u32; STACK_WORDS]);

impl Stack {
    pub const fn new() -> Self {
        Self([0; STACK_WORDS])
    }
}

// ---------------------------------------------------------------------------
// Thread Control Block
// ---------------------------------------------------------------------------

/// Thread Control Block (TCB): the per-thread state record.
pub struct ThreadControlBlock {
    /// Saved stack pointer (PSP). Points into `self.stack`; only valid
    /// while the thread is not running.
    pub stack_pointer: *mut u32,

    /// Index of the next TCB in the ring.
    pub next: usize,

    /// Semaphore this thread is blocked on, if any.
    pub blocked_on: Option<SemaphoreId>,

    /// Remaining sleep time in milliseconds. `0` means not sleeping.
    pub sleep_ticks: u32,

    /// Static priority. Lower value = higher priority.
    pub priority: u8,

    /// Per-thread stack memory.
    pub stack: Stack,
}

// Safety: `stack_pointer` always points into the TCB's own stack array.
// TCBs are only touched with exclusive access to the scheduler, which the
// firmware obtains inside a critical section.
unsafe impl Send for ThreadControlBlock {}

impl ThreadControlBlock {
    /// An unused slot. Used to initialize the static array.
    pub const EMPTY: Self = Self {
        stack_pointer: core::ptr::null_mut(),
        next: 0,
        blocked_on: None,
        sleep_ticks: 0,
        priority: 0,
        stack: Stack::new(),
    };

    /// Initialize this slot for a new thread: not blocked, not sleeping,
    /// with a fresh exception frame. The ring link is set by the scheduler.
    pub fn init(&mut self, spec: &ThreadSpec, next: usize) {
        self.blocked_on = None;
        self.sleep_ticks = 0;
        self.priority = spec.priority;
        self.next = next;
        self.init_stack(spec.entry);
    }

    /// Build the frame the context switch pops on the thread's first run.
    ///
    /// ## Stack Layout (top = high address, growing down)
    ///
    /// ```text
    /// [Hardware stacked frame]
    ///   xPSR  0x01000000 (Thumb bit)
    ///   PC    entry point (bit 0 cleared)
    ///   LR    0x14141414
    ///   R12   0x12121212
    ///   R3    0x03030303
    ///   R2    0x02020202
    ///   R1    0x01010101
    ///   R0    0x00000000
    /// [Software saved context]
    ///   R11   0x11111111
    ///   R10   0x10101010
    ///   R9    0x09090909
    ///   ...
    ///   R4    0x04040404   <- stack_pointer after init
    /// ```
    pub fn init_stack(&mut self, entry: ThreadEntry) {
        let words = &mut self.stack.0;
        let top = STACK_WORDS;

        words[top - 1] = INITIAL_XPSR;
        words[top - 2] = entry as usize as u32 & !1; // T bit lives in xPSR
        words[top - 3] = INITIAL_LR;
        words[top - 4] = 0x1212_1212; // R12
        for r in 0..4u32 {
            // R3 at top-5 down to R0 at top-8
            words[top - 8 + r as usize] = r * 0x0101_0101;
        }
        for r in 4..12u32 {
            // R11 at top-9 down to R4 at top-16
            words[top - 16 + (r - 4) as usize] = register_pattern(r);
        }

        self.stack_pointer = words[top - FRAME_WORDS..].as_mut_ptr();
    }

    /// Ready to run: not blocked and not sleeping.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.blocked_on.is_none() && self.sleep_ticks == 0
    }

    /// Word offset of the saved stack pointer from the base of the stack.
    pub fn stack_offset(&self) -> usize {
        let base = self.stack.0.as_ptr() as usize;
        (self.stack_pointer as usize).wrapping_sub(base) / 4
    }
}

/// Debug pattern for a general-purpose register: the register number
/// written as two decimal digits into every byte (R10 -> 0x10101010).
const fn register_pattern(reg: u32) -> u32 {
    let byte = (reg / 10) * 0x10 + reg % 10;
    byte * 0x0101_0101
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn idle() -> ! {
        loop {}
    }

    #[test]
    fn test_initial_frame_layout() {
        let mut tcb = ThreadControlBlock::EMPTY;
        tcb.init(&ThreadSpec::with_priority(idle, 3), 1);

        let s = &tcb.stack.0;
        let top = STACK_WORDS;
        assert_eq!(s[top - 1], INITIAL_XPSR);
        assert_eq!(s[top - 2], idle as usize as u32 & !1);
        assert_eq!(s[top - 3], INITIAL_LR);
        assert_eq!(s[top - 4], 0x1212_1212);
        assert_eq!(s[top - 5], 0x0303_0303);
        assert_eq!(s[top - 6], 0x0202_0202);
        assert_eq!(s[top - 7], 0x0101_0101);
        assert_eq!(s[top - 8], 0x0000_0000);
        assert_eq!(s[top - 9], 0x1111_1111);
        assert_eq!(s[top - 10], 0x1010_1010);
        assert_eq!(s[top - 11], 0x0909_0909);
        assert_eq!(s[top - 16], 0x0404_0404);

        assert_eq!(tcb.stack_offset(), STACK_WORDS - FRAME_WORDS);
        assert_eq!(tcb.next, 1);
        assert_eq!(tcb.priority, 3);
    }

    #[test]
    fn test_stack_pointer_alignment() {
        let mut tcb = ThreadControlBlock::EMPTY;
        tcb.init_stack(idle);
        assert_eq!(tcb.stack_pointer as usize % 8, 0);
    }

    #[test]
    fn test_readiness() {
        let mut tcb = ThreadControlBlock::EMPTY;
        tcb.init(&ThreadSpec::new(idle), 0);
        assert!(tcb.is_ready());

        tcb.sleep_ticks = 5;
        assert!(!tcb.is_ready());

        tcb.sleep_ticks = 0;
        tcb.blocked_on = Some(SemaphoreId::from_index(2));
        assert!(!tcb.is_ready());
    }

    #[test]
    fn test_priority_range() {
        assert!(ThreadSpec::with_priority(idle, MAX_PRIORITY).is_valid());
        assert!(!ThreadSpec::with_priority(idle, 255).is_valid());
    }
}
