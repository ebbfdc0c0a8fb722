//! # Periodic Event Dispatcher
//!
//! A fixed table of event threads serviced once per SysTick. Each entry
//! counts down by the elapsed time (saturating at zero); when it reaches
//! zero its action runs and the countdown reloads with the full period.
//!
//! Two kinds of action are supported:
//!
//! - [`EventAction::Run`]: a short callback executed inline, in the timer
//!   context, with exclusive access to the kernel. It must run to
//!   completion without blocking, sleeping, spinning or switching context;
//!   it may signal semaphores and put into FIFOs.
//! - [`EventAction::Signal`]: a period trigger. The dispatcher only signals
//!   a semaphore, and the real work happens in a normal thread waiting on
//!   it. This is the preferred form.

use log::{info, warn};

use crate::error::{KernelError, KernelResult};
use crate::scheduler::Scheduler;
use crate::semaphore::SemaphoreId;

/// Callback run by the dispatcher. Runs inside the timer context.
pub type EventCallback = fn(&mut Scheduler);

/// What an event thread does when its period elapses.
#[derive(Clone, Copy)]
pub enum EventAction {
    /// Run a non-blocking callback inline.
    Run(EventCallback),
    /// Signal a semaphore.
    Signal(SemaphoreId),
}

/// Event thread descriptor.
#[derive(Clone, Copy)]
pub struct EventThread {
    pub action: EventAction,
    /// Period in milliseconds.
    pub period: u32,
    /// Milliseconds until the next execution.
    pub countdown: u32,
}

impl Scheduler {
    /// Register a periodic callback. The first run happens one full period
    /// after launch.
    ///
    /// # Errors
    /// - [`KernelError::AlreadyLaunched`] after launch
    /// - [`KernelError::InvalidPeriod`] for a zero period
    /// - [`KernelError::TooManyEvents`] when the table is full
    pub fn add_periodic_event(&mut self, callback: EventCallback, period_ms: u32) -> KernelResult<()> {
        self.add_event(EventAction::Run(callback), period_ms)
    }

    /// Register a period trigger: signal `semaphore` every `period_ms`.
    ///
    /// # Errors
    /// Same as [`Scheduler::add_periodic_event`].
    pub fn add_period_trigger(&mut self, semaphore: SemaphoreId, period_ms: u32) -> KernelResult<()> {
        self.add_event(EventAction::Signal(semaphore), period_ms)
    }

    fn add_event(&mut self, action: EventAction, period: u32) -> KernelResult<()> {
        let checked = if self.launched {
            Err(KernelError::AlreadyLaunched)
        } else if period == 0 {
            Err(KernelError::InvalidPeriod)
        } else {
            self.events
                .push(EventThread { action, period, countdown: period })
                .map_err(|_| KernelError::TooManyEvents)
        };

        match checked {
            Ok(()) => {
                info!("event {} added, period {} ms", self.events.len() - 1, period);
                Ok(())
            }
            Err(e) => {
                warn!("periodic event rejected: {}", e);
                Err(e)
            }
        }
    }

    /// Advance every event countdown by `elapsed` and run the due actions.
    ///
    /// # Returns
    /// `true` if any period trigger signalled its semaphore.
    pub fn run_periodic_events(&mut self, elapsed: u32) -> bool {
        let mut signalled = false;

        for i in 0..self.events.len() {
            let event = &mut self.events[i];
            event.countdown = event.countdown.saturating_sub(elapsed);
            if event.countdown > 0 {
                continue;
            }
            event.countdown = event.period;
            let action = event.action;

            match action {
                EventAction::Run(callback) => callback(self),
                EventAction::Signal(semaphore) => {
                    self.signal(semaphore);
                    signalled = true;
                }
            }
        }

        signalled
    }

    /// Number of registered event threads.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}
