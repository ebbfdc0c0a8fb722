//! # rtkernel
//!
//! A small preemptive real-time kernel for single-core ARM Cortex-M4
//! microcontrollers.
//!
//! ## Overview
//!
//! A fixed set of main threads, declared once before launch, share the
//! processor under one of three policies: strict round robin, round robin
//! over ready threads, or static priority with round robin inside a
//! priority band. Threads synchronize through counting semaphores and
//! FIFOs, sleep for a number of milliseconds, and are fed by periodic event
//! threads that run from the timer interrupt.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                   Application Threads                  │
//! ├────────────────────────────────────────────────────────┤
//! │               Kernel API (kernel.rs, ARM)              │
//! │   init · add_threads · wait · signal · sleep · launch  │
//! ├──────────────┬──────────────────┬──────────────────────┤
//! │  Scheduler   │   Semaphores     │  Channels            │
//! │  scheduler.rs│   semaphore.rs   │  fifo.rs mailbox.rs  │
//! │  sleep.rs    │   ─ wait/signal  │  ─ put/get           │
//! │  periodic.rs │   ─ spin / block │  ─ send/recv         │
//! ├──────────────┴──────────────────┴──────────────────────┤
//! │                Thread Model (thread.rs)                │
//! │          TCB ring · initial stack frame · Stack        │
//! ├────────────────────────────────────────────────────────┤
//! │           Arch Port (arch/cortex_m4.rs, ARM)           │
//! │      PendSV · SysTick · first-thread start · suspend   │
//! ├────────────────────────────────────────────────────────┤
//! │              ARM Cortex-M4 Hardware (Thumb-2)          │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything above the port is plain state manipulation on a
//! [`Scheduler`], so it builds and runs on the host. The `sim` module
//! (tests, or feature `sim`) steps a scheduler tick by tick with closures
//! standing in for threads.
//!
//! ## Memory Model
//!
//! - **No heap**: all kernel state is statically sized
//! - **Fixed TCB array**: `[ThreadControlBlock; MAX_THREADS]`, linked into
//!   a ring by index
//! - **Per-thread stack**: `[u32; STACK_WORDS]` inline in the TCB
//! - **Critical sections**: `critical_section::with`, backed by PRIMASK on
//!   the target

#![cfg_attr(not(any(test, feature = "sim")), no_std)]

pub mod arch;
pub mod config;
pub mod error;
pub mod fifo;
#[cfg(target_arch = "arm")]
pub mod kernel;
pub mod mailbox;
pub mod periodic;
pub mod scheduler;
pub mod semaphore;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod sleep;
pub mod sync;
pub mod thread;

pub use arch::TimeSlice;
pub use error::{KernelError, KernelResult};
pub use fifo::Fifo;
pub use mailbox::Mailbox;
pub use periodic::{EventAction, EventCallback};
pub use scheduler::{SchedulePolicy, Scheduler};
pub use semaphore::{SemaphoreId, WaitOutcome, WaitPolicy};
pub use thread::{ThreadEntry, ThreadSpec};
