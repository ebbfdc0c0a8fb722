//! # rtkernel Demo Firmware
//!
//! A sampling pipeline on a TM4C123 (80 MHz Cortex-M4):
//!
//! | Thread | Priority | Behavior |
//! |--------|----------|----------|
//! | `filter`     | 1 | Blocks on the sample FIFO, posts a moving average to the mailbox |
//! | `heartbeat`  | 1 | Released every 100 ms by a period trigger |
//! | `report`     | 2 | Blocks on the mailbox, publishes the latest average |
//! | `background` | 3 | Always ready; counts and yields between bursts |
//!
//! A periodic event running in the SysTick handler every 5 ms produces
//! one sample into the FIFO. Nothing blocks in that callback; if the filter
//! falls behind, samples are dropped and counted.
//!
//! The scheduler needs a ready thread at every decision, so `background`
//! never blocks or sleeps.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use panic_halt as _;

use rtkernel::config::{FIFO_SIZE, SYSTEM_CLOCK_HZ};
use rtkernel::kernel::{self, SharedFifo, SharedMailbox};
use rtkernel::sync::KernelCell;
use rtkernel::{KernelResult, SchedulePolicy, Scheduler, SemaphoreId, ThreadSpec, WaitPolicy};

static SAMPLES: SharedFifo<u32, FIFO_SIZE> = SharedFifo::new();
static AVERAGE: SharedMailbox<u32> = SharedMailbox::new();
static HEARTBEAT: KernelCell<Option<SemaphoreId>> = KernelCell::new(None);

static NEXT_SAMPLE: AtomicU32 = AtomicU32::new(0);
static LATEST_AVERAGE: AtomicU32 = AtomicU32::new(0);
static BEATS: AtomicU32 = AtomicU32::new(0);

const WINDOW: usize = 4;

// ---------------------------------------------------------------------------
// Event callback (SysTick context)
// ---------------------------------------------------------------------------

/// Produce one synthetic sample. Runs with the kernel already locked.
fn sample(kernel: &mut Scheduler) {
    let value = NEXT_SAMPLE.fetch_add(7, Ordering::Relaxed) % 1024;
    // A full FIFO drops the sample and bumps its lost counter.
    let _ = SAMPLES.put_in(kernel, value);
}

// ---------------------------------------------------------------------------
// Threads
// ---------------------------------------------------------------------------

extern "C" fn filter() -> ! {
    let mut window = [0u32; WINDOW];
    let mut next = 0;
    loop {
        let Ok(value) = SAMPLES.get() else {
            kernel::sleep(10);
            continue;
        };
        window[next] = value;
        next = (next + 1) % WINDOW;
        let average = window.iter().sum::<u32>() / WINDOW as u32;
        // Overwriting an unread average is fine; the newest wins.
        let _ = AVERAGE.send(average);
    }
}

extern "C" fn heartbeat() -> ! {
    let tick = HEARTBEAT.lock(|t| *t);
    loop {
        match tick {
            Some(tick) => {
                kernel::wait(tick);
                BEATS.fetch_add(1, Ordering::Relaxed);
            }
            None => kernel::sleep(100),
        }
    }
}

extern "C" fn report() -> ! {
    loop {
        match AVERAGE.recv() {
            Ok(average) => LATEST_AVERAGE.store(average, Ordering::Relaxed),
            Err(_) => kernel::sleep(10),
        }
    }
}

extern "C" fn background() -> ! {
    let mut count: u32 = 0;
    loop {
        for _ in 0..1000 {
            count = core::hint::black_box(count.wrapping_add(1));
        }
        kernel::suspend();
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

fn setup() -> KernelResult<()> {
    kernel::init(SchedulePolicy::Priority)?;

    SAMPLES.init()?;
    AVERAGE.init()?;
    let tick = kernel::create_semaphore(0, WaitPolicy::Block)?;
    HEARTBEAT.lock(|t| *t = Some(tick));

    kernel::add_threads(&[
        ThreadSpec::with_priority(filter, 1),
        ThreadSpec::with_priority(heartbeat, 1),
        ThreadSpec::with_priority(report, 2),
        ThreadSpec::with_priority(background, 3),
    ])?;

    kernel::add_periodic_event(sample, 5)?;
    kernel::add_period_trigger(tick, 100)?;
    Ok(())
}

fn halt() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

#[entry]
fn main() -> ! {
    let Some(cp) = cortex_m::Peripherals::take() else {
        halt();
    };

    if setup().is_err() {
        halt();
    }

    match kernel::launch(cp, SYSTEM_CLOCK_HZ) {
        Ok(never) => match never {},
        Err(_) => halt(),
    }
}
