//! # Critical Sections
//!
//! Interrupt-safe access to process-wide kernel state. On Cortex-M the
//! `critical-section` implementation comes from `cortex-m`
//! (`critical-section-single-core`), which masks interrupts with PRIMASK;
//! host tests link the `std` implementation instead.
//!
//! All shared state (the scheduler, FIFOs, mailboxes) is kept in a
//! [`KernelCell`] and only touched through [`KernelCell::lock`], so the
//! timer interrupt never observes a half-updated TCB or semaphore.

use core::cell::RefCell;

use critical_section::Mutex;

/// Execute a closure within a critical section (interrupts disabled).
///
/// Keep critical sections as short as possible to minimize interrupt
/// latency. Nesting is allowed; the previous interrupt state is restored
/// on exit.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(critical_section::CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}

/// A static cell whose contents are only reachable inside a critical
/// section.
pub struct KernelCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> KernelCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Run `f` with exclusive access to the contents.
    ///
    /// A nested `lock` on the same cell from inside `f` panics.
    pub fn lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Like [`KernelCell::lock`], inside a critical section the caller
    /// already holds.
    pub fn lock_in<R>(&self, cs: critical_section::CriticalSection<'_>, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.inner.borrow_ref_mut(cs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{SchedulePolicy, Scheduler};
    use crate::semaphore::WaitPolicy;

    static CELL: KernelCell<Scheduler> = KernelCell::new(Scheduler::new(SchedulePolicy::Priority));

    #[test]
    fn test_static_kernel_cell() {
        let sem = CELL.lock(|k| k.create_semaphore(2, WaitPolicy::Spin)).unwrap();
        CELL.lock(|k| k.signal(sem));
        assert_eq!(CELL.lock(|k| k.semaphore_value(sem)), 3);
    }

    #[test]
    fn test_nested_critical_sections() {
        let cell = KernelCell::new(0u32);
        let a = KernelCell::new(1u32);
        critical_section(|cs| {
            cell.lock_in(cs, |v| *v += 1);
            // Nested critical section on a different cell
            a.lock(|v| *v += 1);
        });
        assert_eq!(cell.lock(|v| *v), 1);
        assert_eq!(a.lock(|v| *v), 2);
    }
}
