//! # Kernel Configuration
//!
//! Compile-time constants governing the kernel. All limits are fixed at
//! compile time; nothing is allocated or resized at runtime.

/// Maximum number of threads the kernel can manage.
/// This bounds the static TCB array. Each thread consumes
/// `STACK_WORDS * 4` bytes of RAM for its stack.
pub const MAX_THREADS: usize = 8;

/// Per-thread stack size in 32-bit words. Must hold the deepest call chain
/// plus the hardware exception frame (8 words) and the software-saved
/// context (8 words for R4–R11).
pub const STACK_WORDS: usize = 100;

/// Largest accepted thread priority value. Lower values are more urgent,
/// so `0` is the highest priority and `MAX_PRIORITY` the lowest.
pub const MAX_PRIORITY: u8 = 254;

/// Capacity of the kernel semaphore table.
pub const MAX_SEMAPHORES: usize = 16;

/// Capacity of the periodic event table.
pub const MAX_EVENTS: usize = 4;

/// Default FIFO capacity used by the firmware demo.
pub const FIFO_SIZE: usize = 10;

/// Milliseconds of kernel time represented by one SysTick interrupt.
/// The periodic dispatcher runs on every tick.
pub const TICK_MS: u32 = 1;

/// Period of the sleep maintenance task in milliseconds. Every period,
/// each thread's sleep counter is decremented by this amount.
pub const SLEEP_TIMER_PERIOD_MS: u32 = 10;

/// System clock frequency in Hz (TM4C123 PLL at its fastest setting).
pub const SYSTEM_CLOCK_HZ: u32 = 80_000_000;

/// The SysTick reload register is 24 bits wide.
pub const SYSTICK_MAX_RELOAD: u32 = 0x00FF_FFFF;
