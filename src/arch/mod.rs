//! # Architecture Abstraction Layer
//!
//! Hardware-independent pieces of the port (time-slice validation) plus
//! the Cortex-M4 port itself, which only builds for ARM targets.

use crate::config::SYSTICK_MAX_RELOAD;
use crate::error::{KernelError, KernelResult};

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

/// Length of one scheduler time slice in processor clock cycles.
///
/// SysTick counts down from a 24-bit reload value, so a slice is at most
/// 2^24 cycles long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeSlice(u32);

impl TimeSlice {
    /// # Errors
    /// [`KernelError::InvalidTimeSlice`] unless `1 <= cycles <= 2^24`.
    pub const fn from_cycles(cycles: u32) -> KernelResult<Self> {
        if cycles == 0 || cycles - 1 > SYSTICK_MAX_RELOAD {
            return Err(KernelError::InvalidTimeSlice);
        }
        Ok(Self(cycles))
    }

    /// A slice of `ms` milliseconds at `clock_hz`.
    pub const fn from_millis(ms: u32, clock_hz: u32) -> KernelResult<Self> {
        let cycles = (clock_hz as u64 / 1000) * ms as u64;
        if cycles > u32::MAX as u64 {
            return Err(KernelError::InvalidTimeSlice);
        }
        Self::from_cycles(cycles as u32)
    }

    pub const fn cycles(self) -> u32 {
        self.0
    }

    /// Value to program into the SysTick reload register.
    pub const fn reload(self) -> u32 {
        self.0 - 1
    }
}
