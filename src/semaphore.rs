//! # Counting Semaphores
//!
//! Semaphores live in a fixed table owned by the scheduler and are named by
//! [`SemaphoreId`]. A blocked thread records the id it waits on in its TCB,
//! so identity never depends on where the semaphore's owner is stored.
//!
//! Two wait policies share one counter type:
//!
//! - [`WaitPolicy::Block`]: `wait` decrements unconditionally; a negative
//!   value counts the threads blocked on the semaphore. `signal` wakes one
//!   of them.
//! - [`WaitPolicy::Spin`]: the legacy busy-wait mode. `wait` only
//!   decrements a positive counter and otherwise tells the caller to poll
//!   again with interrupts enabled. The value never goes negative.
//!
//! Strict round robin cannot skip a blocked thread, so under
//! [`SchedulePolicy::RoundRobin`] block-mode semaphores are waited on with
//! spin semantics.
//!
//! Every operation assumes exclusive access to the scheduler; in firmware
//! that is one critical section per call. Using an id that was not returned
//! by [`Scheduler::create_semaphore`] on the same scheduler, or a negative
//! initial value, is a precondition violation and is not checked.

use log::trace;

use crate::error::{KernelError, KernelResult};
use crate::scheduler::{SchedulePolicy, Scheduler};

/// Handle to a semaphore in the scheduler's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SemaphoreId(u8);

impl SemaphoreId {
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u8)
    }

    /// Position in the semaphore table.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a thread waits on an exhausted semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitPolicy {
    /// Busy-wait, re-enabling interrupts between polls.
    Spin,
    /// Block the thread until a matching `signal`.
    Block,
}

/// Result of a single `wait` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitOutcome {
    /// The semaphore was taken; the caller continues.
    Acquired,
    /// The running thread is now blocked. The caller must suspend; when it
    /// resumes, the semaphore has been handed to it.
    Blocked,
    /// Spin policy only: nothing changed, poll again.
    Spin,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Semaphore {
    pub(crate) value: i32,
    pub(crate) policy: WaitPolicy,
}

impl Scheduler {
    /// Allocate a semaphore with an initial value.
    ///
    /// # Errors
    /// [`KernelError::TooManySemaphores`] when the table is full.
    pub fn create_semaphore(&mut self, value: i32, policy: WaitPolicy) -> KernelResult<SemaphoreId> {
        debug_assert!(value >= 0, "negative initial semaphore value");
        let id = SemaphoreId::from_index(self.semaphores.len());
        self.semaphores
            .push(Semaphore { value, policy })
            .map_err(|_| KernelError::TooManySemaphores)?;
        Ok(id)
    }

    /// Reset a semaphore's counter. `value` must not be negative.
    pub fn init_semaphore(&mut self, id: SemaphoreId, value: i32) {
        debug_assert!(value >= 0, "negative initial semaphore value");
        self.semaphores[id.index()].value = value;
    }

    /// Current counter value. Negative values count blocked threads.
    pub fn semaphore_value(&self, id: SemaphoreId) -> i32 {
        self.semaphores[id.index()].value
    }

    /// Wait policy `wait` applies to the semaphore.
    ///
    /// Strict round robin runs every thread in turn, blocked or not, so
    /// under [`SchedulePolicy::RoundRobin`] every semaphore spins.
    pub fn semaphore_policy(&self, id: SemaphoreId) -> WaitPolicy {
        match self.policy {
            SchedulePolicy::RoundRobin => WaitPolicy::Spin,
            _ => self.semaphores[id.index()].policy,
        }
    }

    /// One indivisible wait step on behalf of the running thread.
    pub fn wait(&mut self, id: SemaphoreId) -> WaitOutcome {
        let policy = self.semaphore_policy(id);
        let sem = &mut self.semaphores[id.index()];
        match policy {
            WaitPolicy::Spin => {
                if sem.value > 0 {
                    sem.value -= 1;
                    WaitOutcome::Acquired
                } else {
                    WaitOutcome::Spin
                }
            }
            WaitPolicy::Block => {
                sem.value -= 1;
                if sem.value < 0 {
                    let running = self.running;
                    self.threads[running].blocked_on = Some(id);
                    trace!("thread {} blocked on semaphore {}", running, id.index());
                    WaitOutcome::Blocked
                } else {
                    WaitOutcome::Acquired
                }
            }
        }
    }

    /// Increment the counter. In block mode, when a thread was waiting,
    /// wake exactly one and return its index.
    pub fn signal(&mut self, id: SemaphoreId) -> Option<usize> {
        let sem = &mut self.semaphores[id.index()];
        let previous = sem.value;
        sem.value += 1;

        if sem.policy == WaitPolicy::Block && previous < 0 {
            self.wake_one(id)
        } else {
            None
        }
    }

    /// Unblock the first thread waiting on `id`, scanning the ring from the
    /// thread after the running one. The running thread is checked last.
    fn wake_one(&mut self, id: SemaphoreId) -> Option<usize> {
        let start = self.threads[self.running].next;
        let woken = self
            .ring(start)
            .find(|&i| self.threads[i].blocked_on == Some(id))?;
        self.threads[woken].blocked_on = None;
        trace!("semaphore {} woke thread {}", id.index(), woken);
        Some(woken)
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_SEMAPHORES;
    use crate::scheduler::SchedulePolicy;
    use crate::thread::ThreadSpec;
    use quickcheck_macros::quickcheck;

    extern "C" fn idle() -> ! {
        loop {}
    }

    fn kernel(threads: usize) -> Scheduler {
        let mut k = Scheduler::new(SchedulePolicy::RoundRobinReady);
        let specs = [ThreadSpec::new(idle); 8];
        k.register_threads(&specs[..threads]).unwrap();
        k
    }

    #[test]
    fn test_block_wait_and_signal() {
        let mut k = kernel(3);
        let sem = k.create_semaphore(1, WaitPolicy::Block).unwrap();

        assert_eq!(k.wait(sem), WaitOutcome::Acquired);
        assert_eq!(k.semaphore_value(sem), 0);

        // Thread 0 blocks
        assert_eq!(k.wait(sem), WaitOutcome::Blocked);
        assert_eq!(k.semaphore_value(sem), -1);
        assert_eq!(k.thread(0).blocked_on, Some(sem));
        assert_eq!(k.schedule(), 1);

        // Thread 1 signals and wakes thread 0
        assert_eq!(k.signal(sem), Some(0));
        assert_eq!(k.semaphore_value(sem), 0);
        assert!(k.is_ready(0));
    }

    #[test]
    fn test_signal_without_waiters_wakes_nobody() {
        let mut k = kernel(2);
        let sem = k.create_semaphore(0, WaitPolicy::Block).unwrap();
        assert_eq!(k.signal(sem), None);
        assert_eq!(k.signal(sem), None);
        assert_eq!(k.semaphore_value(sem), 2);
    }

    #[test]
    fn test_wakeup_in_scan_order() {
        let mut k = kernel(4);
        let sem = k.create_semaphore(0, WaitPolicy::Block).unwrap();

        // Threads 0, 1 and 2 block in turn
        for expected in 0..3 {
            assert_eq!(k.running(), expected);
            assert_eq!(k.wait(sem), WaitOutcome::Blocked);
            k.schedule();
        }
        assert_eq!(k.running(), 3);
        assert_eq!(k.semaphore_value(sem), -3);

        // Scan starts after thread 3 and wraps to 0
        assert_eq!(k.signal(sem), Some(0));
        assert_eq!(k.signal(sem), Some(1));
        assert_eq!(k.signal(sem), Some(2));
        assert_eq!(k.semaphore_value(sem), 0);
    }

    #[test]
    fn test_waiters_on_other_semaphores_are_skipped() {
        let mut k = kernel(3);
        let a = k.create_semaphore(0, WaitPolicy::Block).unwrap();
        let b = k.create_semaphore(0, WaitPolicy::Block).unwrap();

        assert_eq!(k.wait(a), WaitOutcome::Blocked); // thread 0
        k.schedule();
        assert_eq!(k.wait(b), WaitOutcome::Blocked); // thread 1
        k.schedule();
        assert_eq!(k.running(), 2);

        assert_eq!(k.signal(b), Some(1));
        assert_eq!(k.thread(0).blocked_on, Some(a));
    }

    #[test]
    fn test_spin_policy_never_goes_negative() {
        let mut k = kernel(1);
        let sem = k.create_semaphore(1, WaitPolicy::Spin).unwrap();

        assert_eq!(k.wait(sem), WaitOutcome::Acquired);
        assert_eq!(k.wait(sem), WaitOutcome::Spin);
        assert_eq!(k.wait(sem), WaitOutcome::Spin);
        assert_eq!(k.semaphore_value(sem), 0);
        assert!(k.is_ready(0));

        assert_eq!(k.signal(sem), None);
        assert_eq!(k.wait(sem), WaitOutcome::Acquired);
    }

    #[test]
    fn test_block_semaphore_spins_under_strict_round_robin() {
        let mut k = Scheduler::new(SchedulePolicy::RoundRobin);
        k.register_threads(&[ThreadSpec::new(idle), ThreadSpec::new(idle)]).unwrap();
        let sem = k.create_semaphore(0, WaitPolicy::Block).unwrap();
        assert_eq!(k.semaphore_policy(sem), WaitPolicy::Spin);

        assert_eq!(k.wait(sem), WaitOutcome::Spin);
        assert_eq!(k.thread(0).blocked_on, None);
        assert_eq!(k.semaphore_value(sem), 0);

        assert_eq!(k.schedule(), 1);
        assert_eq!(k.signal(sem), None);
        assert_eq!(k.schedule(), 0);
        assert_eq!(k.wait(sem), WaitOutcome::Acquired);
        assert_eq!(k.semaphore_value(sem), 0);
    }

    #[test]
    fn test_policy_reports_creation_mode() {
        let mut k = kernel(1);
        let spin = k.create_semaphore(0, WaitPolicy::Spin).unwrap();
        let block = k.create_semaphore(0, WaitPolicy::Block).unwrap();
        assert_eq!(k.semaphore_policy(spin), WaitPolicy::Spin);
        assert_eq!(k.semaphore_policy(block), WaitPolicy::Block);
    }

    #[test]
    fn test_table_capacity() {
        let mut k = Scheduler::new(SchedulePolicy::RoundRobin);
        for _ in 0..MAX_SEMAPHORES {
            k.create_semaphore(0, WaitPolicy::Block).unwrap();
        }
        assert_eq!(
            k.create_semaphore(0, WaitPolicy::Block),
            Err(KernelError::TooManySemaphores)
        );
    }

    #[quickcheck]
    fn qc_init_value_roundtrip(value: u16) -> bool {
        let mut k = Scheduler::new(SchedulePolicy::RoundRobin);
        let sem = k.create_semaphore(0, WaitPolicy::Block).unwrap();
        k.init_semaphore(sem, value as i32);
        k.semaphore_value(sem) == value as i32
    }

    /// Random wait/signal sequences keep `value == init + signals - waits`
    /// as long as some thread stays ready to issue the next call.
    #[quickcheck]
    fn qc_counter_tracks_operations(init: u8, ops: Vec<bool>) -> bool {
        let mut k = kernel(4);
        let init = (init % 4) as i32;
        let sem = k.create_semaphore(init, WaitPolicy::Block).unwrap();
        let (mut waits, mut signals) = (0, 0);

        for is_wait in ops {
            let ready = (0..k.thread_count()).filter(|&i| k.is_ready(i)).count();
            if is_wait && (ready > 1 || k.semaphore_value(sem) > 0) {
                waits += 1;
                if k.wait(sem) == WaitOutcome::Blocked {
                    k.schedule();
                }
            } else {
                signals += 1;
                k.signal(sem);
            }
        }

        let blocked = (0..k.thread_count())
            .filter(|&i| k.thread(i).blocked_on == Some(sem))
            .count() as i32;
        let value = k.semaphore_value(sem);
        value == init + signals - waits && (value >= 0 || -value == blocked)
    }
}
