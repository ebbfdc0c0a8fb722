//! # Kernel
//!
//! The process-wide kernel instance and the calls threads make.
//!
//! Every function here takes the critical section, performs one step on
//! the global [`Scheduler`], releases it, and then, if the thread has to
//! give up the processor, pends a context switch. Blocking never happens
//! with interrupts masked.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init(policy)
//!         ├─► kernel::create_semaphore() / SharedFifo::init()
//!         ├─► kernel::add_threads(&[..])
//!         ├─► kernel::add_periodic_event() / add_period_trigger()
//!         └─► kernel::launch(peripherals, clock_hz)   (no return on success)
//!               ├─► freeze configuration, pick the first thread
//!               ├─► PendSV/SysTick to lowest priority
//!               ├─► SysTick at TICK_MS
//!               └─► start_first_task()
//! ```

use core::convert::Infallible;

use crate::arch::cortex_m4;
use crate::arch::TimeSlice;
use crate::config::TICK_MS;
use crate::error::{KernelError, KernelResult};
use crate::fifo::Fifo;
use crate::mailbox::Mailbox;
use crate::periodic::EventCallback;
use crate::scheduler::{SchedulePolicy, Scheduler};
use crate::semaphore::{SemaphoreId, WaitOutcome, WaitPolicy};
use crate::sync::{critical_section, KernelCell};
use crate::thread::ThreadSpec;

/// The kernel instance. Only reachable inside a critical section.
pub(crate) static KERNEL: KernelCell<Scheduler> =
    KernelCell::new(Scheduler::new(SchedulePolicy::Priority));

// ---------------------------------------------------------------------------
// Configuration (before launch)
// ---------------------------------------------------------------------------

/// Select the scheduling policy. Call before anything else.
///
/// # Errors
/// [`KernelError::AlreadyLaunched`] once the kernel runs.
pub fn init(policy: SchedulePolicy) -> KernelResult<()> {
    KERNEL.lock(|k| {
        if k.is_launched() {
            return Err(KernelError::AlreadyLaunched);
        }
        k.policy = policy;
        Ok(())
    })
}

/// Register the main threads. See [`Scheduler::register_threads`].
pub fn add_threads(specs: &[ThreadSpec]) -> KernelResult<()> {
    KERNEL.lock(|k| k.register_threads(specs))
}

/// Run `callback` every `period_ms` in the SysTick handler.
pub fn add_periodic_event(callback: EventCallback, period_ms: u32) -> KernelResult<()> {
    KERNEL.lock(|k| k.add_periodic_event(callback, period_ms))
}

/// Signal `semaphore` every `period_ms`.
pub fn add_period_trigger(semaphore: SemaphoreId, period_ms: u32) -> KernelResult<()> {
    KERNEL.lock(|k| k.add_period_trigger(semaphore, period_ms))
}

pub fn create_semaphore(value: i32, policy: WaitPolicy) -> KernelResult<SemaphoreId> {
    KERNEL.lock(|k| k.create_semaphore(value, policy))
}

/// Reset a semaphore's counter.
pub fn init_semaphore(semaphore: SemaphoreId, value: i32) {
    KERNEL.lock(|k| k.init_semaphore(semaphore, value));
}

/// Start scheduling. Does not return on success.
///
/// SysTick is programmed for one `TICK_MS` slice at `clock_hz`. The slice
/// is not a separate argument because every SysTick advances kernel time
/// by `TICK_MS`: sleep counters and event periods are counted in those
/// ticks, so a different slice length would skew both.
///
/// # Errors
/// - [`KernelError::NoThreads`] if no thread was registered
/// - [`KernelError::AlreadyLaunched`] on a second call
/// - [`KernelError::InvalidTimeSlice`] if `TICK_MS` at `clock_hz` does not
///   fit the SysTick reload register
pub fn launch(mut core: cortex_m::Peripherals, clock_hz: u32) -> KernelResult<Infallible> {
    let slice = TimeSlice::from_millis(TICK_MS, clock_hz)?;

    let was_enabled = cortex_m::register::primask::read().is_inactive();
    cortex_m::interrupt::disable();

    let first = KERNEL.lock(|k| k.launch().map(|_| k.running_stack_pointer()));
    let first_sp = match first {
        Ok(sp) => sp,
        Err(e) => {
            if was_enabled {
                // Safety: restores the state found on entry.
                unsafe { cortex_m::interrupt::enable() };
            }
            return Err(e);
        }
    };

    cortex_m4::set_interrupt_priorities(&mut core.SCB);
    cortex_m4::configure_systick(&mut core.SYST, slice);

    // Safety: interrupts are off, we run on the MSP, and `first_sp` points
    // at a frame built by `register_threads`.
    unsafe { cortex_m4::start_first_task(first_sp) }
}

// ---------------------------------------------------------------------------
// Thread calls (after launch)
// ---------------------------------------------------------------------------

/// Acquire `semaphore`.
///
/// Spin-mode semaphores are polled with interrupts enabled between polls.
/// Block-mode semaphores mark the thread blocked and switch away; the call
/// returns once a `signal` has handed the unit to this thread. Under
/// strict round robin every semaphore is polled.
pub fn wait(semaphore: SemaphoreId) {
    loop {
        match KERNEL.lock(|k| k.wait(semaphore)) {
            WaitOutcome::Acquired => return,
            WaitOutcome::Blocked => {
                park();
                return;
            }
            WaitOutcome::Spin => cortex_m::asm::nop(),
        }
    }
}

/// Switch away until the running thread is no longer blocked.
fn park() {
    loop {
        cortex_m4::suspend();
        if KERNEL.lock(|k| k.thread(k.running()).blocked_on.is_none()) {
            return;
        }
    }
}

/// Release `semaphore`, waking one blocked thread if any. Does not yield.
pub fn signal(semaphore: SemaphoreId) {
    KERNEL.lock(|k| k.signal(semaphore));
}

/// Sleep for about `ms` milliseconds. `sleep(0)` yields.
///
/// Sleep counters drop by `SLEEP_TIMER_PERIOD_MS` at fixed boundaries of
/// that period, so the wake time is only accurate to one period in either
/// direction: `sleep(5)` issued just before a boundary ends at it.
pub fn sleep(ms: u32) {
    KERNEL.lock(|k| k.sleep(ms));
    cortex_m4::suspend();
}

/// Give up the rest of the time slice.
pub fn suspend() {
    cortex_m4::suspend();
}

/// Milliseconds since launch.
pub fn uptime_ms() -> u64 {
    KERNEL.lock(|k| k.uptime_ms())
}

/// Index of the calling thread.
pub fn current_thread() -> usize {
    KERNEL.lock(|k| k.running())
}

// ---------------------------------------------------------------------------
// Shared channels
// ---------------------------------------------------------------------------

/// A [`Fifo`] in a static, for threads, event callbacks and interrupts.
pub struct SharedFifo<T: Copy + Default, const N: usize> {
    inner: KernelCell<Option<Fifo<T, N>>>,
}

impl<T: Copy + Default, const N: usize> SharedFifo<T, N> {
    pub const fn new() -> Self {
        Self { inner: KernelCell::new(None) }
    }

    /// Allocate the FIFO's semaphore. Call before launch.
    pub fn init(&self) -> KernelResult<()> {
        critical_section(|cs| {
            let fifo = KERNEL.lock_in(cs, Fifo::<T, N>::new)?;
            self.inner.lock_in(cs, |slot| *slot = Some(fifo));
            Ok(())
        })
    }

    /// Append from a thread or interrupt handler. Never blocks.
    pub fn put(&self, item: T) -> KernelResult<()> {
        KERNEL.lock(|k| self.put_in(k, item))
    }

    /// Append from an event callback, which already holds the kernel.
    pub fn put_in(&self, kernel: &mut Scheduler, item: T) -> KernelResult<()> {
        self.inner.lock(|slot| match slot {
            Some(fifo) => fifo.put(kernel, item),
            None => Err(KernelError::Uninitialized),
        })
    }

    /// Remove the oldest item, blocking while the FIFO is empty.
    pub fn get(&self) -> KernelResult<T> {
        let size = self
            .inner
            .lock(|slot| slot.as_ref().map(Fifo::semaphore))
            .ok_or(KernelError::Uninitialized)?;
        wait(size);
        self.inner
            .lock(|slot| slot.as_mut().map(Fifo::take))
            .ok_or(KernelError::Uninitialized)
    }

    /// Items dropped because the FIFO was full.
    pub fn lost(&self) -> u32 {
        self.inner.lock(|slot| slot.as_ref().map_or(0, Fifo::lost))
    }
}

/// A [`Mailbox`] in a static.
pub struct SharedMailbox<T: Copy> {
    inner: KernelCell<Option<Mailbox<T>>>,
}

impl<T: Copy> SharedMailbox<T> {
    pub const fn new() -> Self {
        Self { inner: KernelCell::new(None) }
    }

    pub fn init(&self) -> KernelResult<()> {
        critical_section(|cs| {
            let mailbox = KERNEL.lock_in(cs, Mailbox::<T>::new)?;
            self.inner.lock_in(cs, |slot| *slot = Some(mailbox));
            Ok(())
        })
    }

    pub fn send(&self, item: T) -> KernelResult<()> {
        KERNEL.lock(|k| self.send_in(k, item))
    }

    /// Send from an event callback, which already holds the kernel.
    pub fn send_in(&self, kernel: &mut Scheduler, item: T) -> KernelResult<()> {
        self.inner.lock(|slot| match slot {
            Some(mailbox) => mailbox.send(kernel, item),
            None => Err(KernelError::Uninitialized),
        })
    }

    /// Receive, blocking while the mailbox is empty.
    pub fn recv(&self) -> KernelResult<T> {
        let sem = self
            .inner
            .lock(|slot| slot.as_ref().map(Mailbox::semaphore))
            .ok_or(KernelError::Uninitialized)?;
        wait(sem);
        self.inner
            .lock(|slot| slot.as_mut().and_then(Mailbox::take))
            .ok_or(KernelError::Uninitialized)
    }
}
