//! # Sleep
//!
//! Per-thread sleep counters, in milliseconds. A maintenance task running
//! at a fixed rate (every `SLEEP_TIMER_PERIOD_MS`, from
//! [`Scheduler::system_tick`]) subtracts the elapsed time from every
//! counter, saturating at zero. A thread whose counter is zero takes part in
//! scheduling again from the next decision on.

use log::trace;

use crate::scheduler::Scheduler;

impl Scheduler {
    /// Put the running thread to sleep for `ms` milliseconds.
    ///
    /// The caller must suspend right after this returns. `sleep(0)` leaves
    /// the thread ready, so the suspend only gives up the rest of the
    /// current time slice.
    pub fn sleep(&mut self, ms: u32) {
        let running = self.running;
        self.threads[running].sleep_ticks = ms;
        if ms > 0 {
            trace!("thread {} sleeping {} ms", running, ms);
        }
    }

    /// Subtract `elapsed` from every thread's sleep counter, saturating at
    /// zero.
    pub fn update_sleep_timers(&mut self, elapsed: u32) {
        for tcb in &mut self.threads[..self.thread_count] {
            tcb.sleep_ticks = tcb.sleep_ticks.saturating_sub(elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::scheduler::{SchedulePolicy, Scheduler};
    use crate::thread::ThreadSpec;

    extern "C" fn idle() -> ! {
        loop {}
    }

    fn kernel() -> Scheduler {
        let mut k = Scheduler::new(SchedulePolicy::RoundRobinReady);
        k.register_threads(&[ThreadSpec::new(idle), ThreadSpec::new(idle)]).unwrap();
        k
    }

    #[test]
    fn test_ready_exactly_after_last_decrement() {
        let mut k = kernel();
        k.sleep(3);
        assert!(!k.is_ready(0));

        k.update_sleep_timers(1);
        assert!(!k.is_ready(0));
        k.update_sleep_timers(1);
        assert!(!k.is_ready(0));
        k.update_sleep_timers(1);
        assert!(k.is_ready(0));
    }

    #[test]
    fn test_decrement_saturates() {
        let mut k = kernel();
        k.sleep(7);
        k.update_sleep_timers(10);
        assert_eq!(k.thread(0).sleep_ticks, 0);
        k.update_sleep_timers(10);
        assert_eq!(k.thread(0).sleep_ticks, 0);
    }

    #[test]
    fn test_sleep_zero_is_a_yield() {
        let mut k = kernel();
        k.sleep(0);
        assert!(k.is_ready(0));
        assert_eq!(k.schedule(), 1);
        assert_eq!(k.schedule(), 0);
    }

    #[test]
    fn test_sleeping_thread_is_skipped_until_woken() {
        let mut k = kernel();
        k.sleep(20);
        assert_eq!(k.schedule(), 1);
        assert_eq!(k.schedule(), 1);

        k.update_sleep_timers(10);
        assert_eq!(k.schedule(), 1);
        k.update_sleep_timers(10);
        assert_eq!(k.schedule(), 0);
    }
}
