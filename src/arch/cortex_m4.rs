//! # Cortex-M4 Port Layer
//!
//! Context switching via PendSV, SysTick configuration and first-thread
//! launch for ARMv7E-M (Thumb-2).
//!
//! ## Context Switch Mechanism
//!
//! Threads run in Thread mode on the process stack (PSP); handlers run on
//! the main stack (MSP). On exception entry the hardware stacks R0–R3,
//! R12, LR, PC and xPSR onto the PSP. PendSV saves R4–R11 below that frame,
//! hands the resulting stack pointer to the scheduler, and restores R4–R11
//! from whichever stack the scheduler returns.
//!
//! No floating-point context is saved. Build for `thumbv7em-none-eabi`
//! (soft float), or keep FPU use out of threads.
//!
//! ## Interrupt Priorities
//!
//! SysTick and PendSV both sit at the lowest priority (0xFF), so a context
//! switch never preempts an application interrupt handler.

use core::arch::naked_asm;

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};

use super::TimeSlice;
use crate::kernel::KERNEL;

/// Lowest exception priority.
const LOWEST_PRIORITY: u8 = 0xFF;

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Start SysTick on the core clock with one interrupt per time slice.
pub fn configure_systick(syst: &mut SYST, slice: TimeSlice) {
    syst.disable_counter();
    syst.set_clock_source(SystClkSource::Core);
    syst.set_reload(slice.reload());
    syst.clear_current();
    syst.enable_interrupt();
    syst.enable_counter();
}

/// Drop PendSV and SysTick to the lowest priority.
pub fn set_interrupt_priorities(scb: &mut SCB) {
    // Safety: priorities are set before the first thread starts, and both
    // handlers are lowered, never raised, so no priority-based critical
    // section is broken.
    unsafe {
        scb.set_priority(SystemHandler::PendSV, LOWEST_PRIORITY);
        scb.set_priority(SystemHandler::SysTick, LOWEST_PRIORITY);
    }
}

// ---------------------------------------------------------------------------
// PendSV trigger
// ---------------------------------------------------------------------------

/// Request a context switch. It is taken once no other handler is active.
#[inline]
pub fn trigger_pendsv() {
    SCB::set_pendsv();
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

/// Give up the rest of the running thread's time slice.
///
/// Clears the SysTick counter so the next thread gets a full slice, then
/// pends a context switch.
pub fn suspend() {
    // Safety: any write to CVR only clears the count and COUNTFLAG.
    unsafe { (*SYST::PTR).cvr.write(0) };
    trigger_pendsv();
}

// ---------------------------------------------------------------------------
// First thread launch
// ---------------------------------------------------------------------------

/// Switch Thread mode to the PSP and jump into the first thread.
///
/// `psp` is the thread's saved stack pointer, pointing at the software
/// frame (R4–R11) built by `ThreadControlBlock::init_stack`. Interrupts
/// are enabled right before the branch.
///
/// # Safety
/// Call once, from the main stack, with interrupts disabled and `psp`
/// pointing at an initial frame.
#[unsafe(naked)]
pub unsafe extern "C" fn start_first_task(psp: *const u32) -> ! {
    naked_asm!(
        "adds r0, #32",          // skip R4-R11, nothing to restore yet
        "msr psp, r0",
        "movs r0, #2",           // CONTROL.SPSEL = 1
        "msr control, r0",
        "isb",
        "pop {{r0-r3, r12}}",
        "pop {{lr}}",
        "pop {{r5}}",            // PC
        "orr r5, r5, #1",
        "pop {{r6}}",            // xPSR, discarded
        "cpsie i",
        "bx r5",
    );
}

// ---------------------------------------------------------------------------
// PendSV handler (context switch)
// ---------------------------------------------------------------------------

/// PendSV handler.
///
/// 1. Push R4–R11 onto the outgoing thread's stack.
/// 2. `switch_context` stores that stack pointer, runs the scheduler and
///    returns the incoming thread's stack pointer.
/// 3. Pop R4–R11 from it and return to Thread mode on the PSP. LR still
///    holds the EXC_RETURN value from entry.
///
/// # Safety
/// Only the NVIC calls this.
#[unsafe(naked)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",
        "push {{r3, lr}}",       // r3 keeps MSP 8-byte aligned
        "bl {switch}",
        "pop {{r3, lr}}",
        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",
        "bx lr",
        switch = sym switch_context,
    );
}

/// Save the outgoing stack pointer, pick the next thread and return its
/// stack pointer. Called from PendSV only.
extern "C" fn switch_context(psp: *mut u32) -> *mut u32 {
    KERNEL.lock(|kernel| {
        kernel.save_context(psp);
        kernel.schedule();
        kernel.running_stack_pointer()
    })
}

// ---------------------------------------------------------------------------
// SysTick handler
// ---------------------------------------------------------------------------

/// SysTick handler: advance kernel time, then always reschedule.
#[unsafe(no_mangle)]
pub extern "C" fn SysTick() {
    KERNEL.lock(|kernel| kernel.system_tick());
    trigger_pendsv();
}
