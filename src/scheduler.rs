//! # Scheduler
//!
//! The kernel state struct and the thread-selection policy.
//!
//! [`Scheduler`] owns every piece of mutable kernel state: the TCB ring,
//! the index of the running thread, the semaphore table and the periodic
//! event table. Every operation takes `&mut self`; the firmware keeps one
//! instance in a static and only touches it inside a critical section,
//! while host tests drive it directly.
//!
//! ## Scheduling Policies
//!
//! At each SysTick (and on every voluntary suspend) the port calls
//! [`Scheduler::schedule`]:
//!
//! - **RoundRobin**: the next thread in the ring, unconditionally.
//! - **RoundRobinReady**: the first ready thread after the running one.
//! - **Priority**: the ready thread with the smallest priority value. The
//!   scan starts after the running thread and ends with it, and the first
//!   thread found wins a tie, so equal-priority threads take turns.
//!
//! At least one thread must be ready when a decision is made. If none is,
//! the running thread is kept.

use heapless::Vec;
use log::{info, trace, warn};

use crate::config::{MAX_EVENTS, MAX_SEMAPHORES, MAX_THREADS, SLEEP_TIMER_PERIOD_MS, TICK_MS};
use crate::error::{KernelError, KernelResult};
use crate::periodic::EventThread;
use crate::semaphore::Semaphore;
use crate::thread::{ThreadControlBlock, ThreadSpec};

/// Thread-selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulePolicy {
    /// Strict rotation, ignoring blocking and sleep.
    RoundRobin,
    /// Rotation that skips blocked and sleeping threads.
    RoundRobinReady,
    /// Static priority with round robin among equal priorities.
    Priority,
}

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// The kernel state. Holds all thread control blocks, semaphores and
/// periodic events.
///
/// Stack pointers point into the TCB array, so the scheduler must not move
/// once threads are registered.
pub struct Scheduler {
    pub(crate) threads: [ThreadControlBlock; MAX_THREADS],
    pub(crate) thread_count: usize,
    pub(crate) running: usize,
    pub(crate) policy: SchedulePolicy,
    pub(crate) semaphores: Vec<Semaphore, MAX_SEMAPHORES>,
    pub(crate) events: Vec<EventThread, MAX_EVENTS>,
    pub(crate) uptime_ms: u64,
    pub(crate) sleep_elapsed_ms: u32,
    pub(crate) launched: bool,
}

impl Scheduler {
    /// Create an empty scheduler.
    pub const fn new(policy: SchedulePolicy) -> Self {
        Self {
            threads: [ThreadControlBlock::EMPTY; MAX_THREADS],
            thread_count: 0,
            running: 0,
            policy,
            semaphores: Vec::new(),
            events: Vec::new(),
            uptime_ms: 0,
            sleep_elapsed_ms: 0,
            launched: false,
        }
    }

    /// Install the main threads, in declaration order.
    ///
    /// Builds each thread's initial stack frame, links the TCBs into a ring
    /// and makes the first thread the running one. May be called once,
    /// before launch.
    ///
    /// # Errors
    /// - [`KernelError::AlreadyLaunched`] after [`Scheduler::launch`]
    /// - [`KernelError::AlreadyRegistered`] on a second call
    /// - [`KernelError::NoThreads`] for an empty list
    /// - [`KernelError::TooManyThreads`] for more than `MAX_THREADS`
    /// - [`KernelError::InvalidPriority`] for a priority above `MAX_PRIORITY`
    pub fn register_threads(&mut self, specs: &[ThreadSpec]) -> KernelResult<()> {
        let checked = if self.launched {
            Err(KernelError::AlreadyLaunched)
        } else if self.thread_count > 0 {
            Err(KernelError::AlreadyRegistered)
        } else if specs.is_empty() {
            Err(KernelError::NoThreads)
        } else if specs.len() > MAX_THREADS {
            Err(KernelError::TooManyThreads)
        } else if !specs.iter().all(ThreadSpec::is_valid) {
            Err(KernelError::InvalidPriority)
        } else {
            Ok(())
        };
        if let Err(e) = checked {
            warn!("thread registration rejected: {}", e);
            return Err(e);
        }

        let count = specs.len();
        for (i, spec) in specs.iter().enumerate() {
            self.threads[i].init(spec, (i + 1) % count);
        }
        self.thread_count = count;
        self.running = 0;

        info!("registered {} threads ({:?})", count, self.policy);
        Ok(())
    }

    /// Freeze the configuration and return the first thread to run.
    ///
    /// Launch is one way; there is no return path to an unlaunched kernel.
    pub fn launch(&mut self) -> KernelResult<usize> {
        if self.launched {
            return Err(KernelError::AlreadyLaunched);
        }
        if self.thread_count == 0 {
            return Err(KernelError::NoThreads);
        }
        self.launched = true;
        info!(
            "launching: {} threads, {} semaphores, {} periodic events",
            self.thread_count,
            self.semaphores.len(),
            self.events.len()
        );
        Ok(self.running)
    }

    /// Select the next thread to run and make it the running one.
    ///
    /// # Returns
    /// Index of the thread that now runs.
    pub fn schedule(&mut self) -> usize {
        let after = self.threads[self.running].next;
        let next = match self.policy {
            SchedulePolicy::RoundRobin => after,
            SchedulePolicy::RoundRobinReady => self
                .ring(after)
                .find(|&i| self.threads[i].is_ready())
                .unwrap_or(self.running),
            SchedulePolicy::Priority => {
                let mut best: Option<usize> = None;
                for i in self.ring(after) {
                    let tcb = &self.threads[i];
                    if !tcb.is_ready() {
                        continue;
                    }
                    if best.map_or(true, |b| tcb.priority < self.threads[b].priority) {
                        best = Some(i);
                    }
                }
                best.unwrap_or(self.running)
            }
        };

        if next != self.running {
            trace!("switch {} -> {}", self.running, next);
        }
        self.running = next;
        next
    }

    /// Advance kernel time by one SysTick period.
    ///
    /// Runs the periodic dispatcher on every tick and the sleep maintenance
    /// task every `SLEEP_TIMER_PERIOD_MS`. The caller reschedules afterwards.
    pub fn system_tick(&mut self) {
        self.uptime_ms += TICK_MS as u64;

        self.run_periodic_events(TICK_MS);

        self.sleep_elapsed_ms += TICK_MS;
        if self.sleep_elapsed_ms >= SLEEP_TIMER_PERIOD_MS {
            let elapsed = self.sleep_elapsed_ms;
            self.sleep_elapsed_ms = 0;
            self.update_sleep_timers(elapsed);
        }
    }

    /// Record the stack pointer of the thread being switched out.
    pub fn save_context(&mut self, stack_pointer: *mut u32) {
        self.threads[self.running].stack_pointer = stack_pointer;
    }

    /// Saved stack pointer of the running thread.
    pub fn running_stack_pointer(&self) -> *mut u32 {
        self.threads[self.running].stack_pointer
    }

    /// Index of the running thread.
    #[inline]
    pub fn running(&self) -> usize {
        self.running
    }

    /// Number of registered threads.
    #[inline]
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// The TCB at `index`.
    pub fn thread(&self, index: usize) -> &ThreadControlBlock {
        &self.threads[index]
    }

    /// Whether the thread at `index` is ready to run.
    pub fn is_ready(&self, index: usize) -> bool {
        self.threads[index].is_ready()
    }

    pub fn policy(&self) -> SchedulePolicy {
        self.policy
    }

    pub fn is_launched(&self) -> bool {
        self.launched
    }

    /// Milliseconds of kernel time since launch.
    pub fn uptime_ms(&self) -> u64 {
        self.uptime_ms
    }

    /// Thread indices in ring order, starting at `start`, covering every
    /// registered thread once.
    pub(crate) fn ring(&self, start: usize) -> impl Iterator<Item = usize> + '_ {
        let mut cursor = start;
        (0..self.thread_count).map(move |_| {
            let current = cursor;
            cursor = self.threads[current].next;
            current
        })
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
