//! # Host Simulation
//!
//! Drives a [`Scheduler`] on the host, one millisecond tick at a time, with
//! thread bodies written as closures instead of `extern "C"` entry points.
//!
//! Each [`Simulator::step`] mirrors one time slice on the target:
//!
//! 1. the running thread, if it is ready, executes one step of its body;
//! 2. SysTick fires: [`Scheduler::system_tick`];
//! 3. PendSV picks the next thread: [`Scheduler::schedule`].
//!
//! A body never blocks. When a kernel call reports that the thread is now
//! blocked or sleeping, the body records that in the shared state and
//! returns; it is not stepped again until the kernel makes it ready. This
//! is the same contract [`Fifo::get`](crate::fifo::Fifo::get) and
//! [`Fifo::take`](crate::fifo::Fifo::take) expose to firmware.

use log::debug;

use crate::error::KernelResult;
use crate::scheduler::{SchedulePolicy, Scheduler};
use crate::thread::ThreadSpec;

/// One step of a simulated thread.
pub type ThreadBody<S> = Box<dyn FnMut(&mut Scheduler, &mut S)>;

/// Stand-in entry point; simulated threads never reach the hardware frame.
extern "C" fn parked() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

pub struct Simulator<S> {
    pub kernel: Scheduler,
    pub state: S,
    bodies: Vec<ThreadBody<S>>,
    specs: Vec<ThreadSpec>,
}

impl<S> Simulator<S> {
    /// Create a simulator. `setup` runs against the fresh kernel so the
    /// shared state can allocate semaphores, FIFOs and events.
    pub fn new(
        policy: SchedulePolicy,
        setup: impl FnOnce(&mut Scheduler) -> KernelResult<S>,
    ) -> KernelResult<Self> {
        let mut kernel = Scheduler::new(policy);
        let state = setup(&mut kernel)?;
        Ok(Self {
            kernel,
            state,
            bodies: Vec::new(),
            specs: Vec::new(),
        })
    }

    /// Declare a thread. Threads are registered in declaration order.
    pub fn spawn(
        &mut self,
        priority: u8,
        body: impl FnMut(&mut Scheduler, &mut S) + 'static,
    ) -> &mut Self {
        self.specs.push(ThreadSpec::with_priority(parked, priority));
        self.bodies.push(Box::new(body));
        self
    }

    /// Register the declared threads and launch the kernel.
    pub fn start(&mut self) -> KernelResult<()> {
        self.kernel.register_threads(&self.specs)?;
        let first = self.kernel.launch()?;
        debug!("simulation started at thread {}", first);
        Ok(())
    }

    /// Advance by one tick.
    pub fn step(&mut self) {
        let running = self.kernel.running();
        if self.kernel.is_ready(running) {
            (self.bodies[running])(&mut self.kernel, &mut self.state);
        }
        self.kernel.system_tick();
        self.kernel.schedule();
    }

    /// Advance by `ms` ticks.
    pub fn run_for(&mut self, ms: u32) {
        for _ in 0..ms {
            self.step();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FIFO_SIZE;
    use crate::fifo::Fifo;
    use crate::semaphore::{SemaphoreId, WaitOutcome, WaitPolicy};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    struct Pipeline {
        fifo: Fifo<u32, FIFO_SIZE>,
        produced: bool,
        consumer_waiting: bool,
        received: Vec<u32>,
        work: u32,
        naps: u32,
    }

    fn pipeline() -> Simulator<Pipeline> {
        let mut sim = Simulator::new(SchedulePolicy::Priority, |k| {
            Ok(Pipeline {
                fifo: Fifo::new(k)?,
                produced: false,
                consumer_waiting: false,
                received: Vec::new(),
                work: 0,
                naps: 0,
            })
        })
        .unwrap();

        sim.spawn(0, |k, s: &mut Pipeline| {
            let item = if s.consumer_waiting {
                s.consumer_waiting = false;
                Some(s.fifo.take())
            } else {
                s.fifo.get(k)
            };
            match item {
                Some(v) => s.received.push(v),
                None => s.consumer_waiting = true,
            }
        })
        .spawn(1, |k, s: &mut Pipeline| {
            if s.produced {
                k.sleep(50);
            } else {
                s.fifo.put(k, 42).unwrap();
                s.produced = true;
            }
        })
        .spawn(2, |_, s: &mut Pipeline| s.work += 1)
        .spawn(2, |k, s: &mut Pipeline| {
            s.naps += 1;
            k.sleep(30);
        });
        sim.start().unwrap();
        sim
    }

    #[test]
    fn test_consumer_sees_item_exactly_once() {
        init_logger();
        let mut sim = pipeline();
        sim.run_for(200);

        assert_eq!(sim.state.received, vec![42]);
        assert!(sim.state.fifo.is_empty());
        assert_eq!(sim.state.fifo.lost(), 0);
        // Consumer is parked on the empty FIFO again.
        assert!(!sim.kernel.is_ready(0));
        assert_eq!(sim.kernel.semaphore_value(sim.state.fifo.semaphore()), -1);
    }

    #[test]
    fn test_lower_priorities_run_while_others_wait() {
        init_logger();
        let mut sim = pipeline();
        sim.run_for(200);

        assert!(sim.state.work > 0);
        assert!(sim.state.naps >= 2);
        assert_eq!(sim.kernel.uptime_ms(), 200);
    }

    struct Sampler {
        tick: SemaphoreId,
        armed: bool,
        runs: u32,
        background: u32,
    }

    #[test]
    fn test_period_trigger_releases_waiting_thread() {
        init_logger();
        let mut sim = Simulator::new(SchedulePolicy::Priority, |k| {
            let tick = k.create_semaphore(0, WaitPolicy::Block)?;
            k.add_period_trigger(tick, 10)?;
            Ok(Sampler { tick, armed: false, runs: 0, background: 0 })
        })
        .unwrap();

        sim.spawn(0, |k, s: &mut Sampler| {
            if s.armed {
                s.armed = false;
                s.runs += 1;
                return;
            }
            match k.wait(s.tick) {
                WaitOutcome::Acquired => s.runs += 1,
                WaitOutcome::Blocked => s.armed = true,
                WaitOutcome::Spin => {}
            }
        })
        .spawn(1, |_, s: &mut Sampler| s.background += 1);
        sim.start().unwrap();

        // Triggers at 10..=100 ms; each is consumed on the following tick.
        sim.run_for(100);
        assert_eq!(sim.state.runs, 9);
        assert!(sim.kernel.is_ready(0));

        sim.step();
        assert_eq!(sim.state.runs, 10);
        assert!(sim.state.background > 0);
    }

    #[test]
    fn test_spawn_after_start_is_rejected() {
        let mut sim = Simulator::new(SchedulePolicy::RoundRobin, |_| Ok(())).unwrap();
        sim.spawn(0, |_, _| {});
        sim.start().unwrap();
        assert!(sim.start().is_err());
    }
}
