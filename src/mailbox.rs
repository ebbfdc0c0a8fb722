//! # Mailbox
//!
//! One-slot channel from a producer (usually an event callback) to one
//! consumer thread, synchronized by a block-mode semaphore. Sending never
//! blocks; sending into a full mailbox overwrites the unread item and counts
//! it as lost.

use log::warn;

use crate::error::{KernelError, KernelResult};
use crate::scheduler::Scheduler;
use crate::semaphore::{SemaphoreId, WaitOutcome, WaitPolicy};

pub struct Mailbox<T: Copy> {
    slot: Option<T>,
    sem: SemaphoreId,
    lost: u32,
}

impl<T: Copy> Mailbox<T> {
    /// Create an empty mailbox, allocating its semaphore.
    pub fn new(kernel: &mut Scheduler) -> KernelResult<Self> {
        let sem = kernel.create_semaphore(0, WaitPolicy::Block)?;
        Ok(Self { slot: None, sem, lost: 0 })
    }

    /// Deliver an item.
    ///
    /// # Errors
    /// [`KernelError::MailboxFull`] if unread data was overwritten. The new
    /// item is stored either way; the semaphore is only signalled for an
    /// empty mailbox so it never counts more than one item.
    pub fn send(&mut self, kernel: &mut Scheduler, item: T) -> KernelResult<()> {
        if self.slot.replace(item).is_some() {
            self.lost = self.lost.wrapping_add(1);
            warn!("mailbox overwritten, {} items lost", self.lost);
            return Err(KernelError::MailboxFull);
        }
        kernel.signal(self.sem);
        Ok(())
    }

    /// Receive on behalf of the running thread. `None` means nothing was
    /// taken: a blocked thread calls [`Mailbox::take`] once resumed, and
    /// under strict round robin the thread polls again later.
    pub fn recv(&mut self, kernel: &mut Scheduler) -> Option<T> {
        match kernel.wait(self.sem) {
            WaitOutcome::Acquired => self.slot.take(),
            WaitOutcome::Blocked | WaitOutcome::Spin => None,
        }
    }

    /// Read the item granted to a woken receiver.
    pub fn take(&mut self) -> Option<T> {
        self.slot.take()
    }

    /// Number of items overwritten before being read.
    pub fn lost(&self) -> u32 {
        self.lost
    }

    pub fn semaphore(&self) -> SemaphoreId {
        self.sem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedulePolicy;
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
    fn test_send_then_recv() {
        let mut k = kernel();
        let mut mb = Mailbox::new(&mut k).unwrap();
        mb.send(&mut k, 7u32).unwrap();
        assert_eq!(mb.recv(&mut k), Some(7));
        assert_eq!(k.semaphore_value(mb.semaphore()), 0);
    }

    #[test]
    fn test_overwrite_is_counted() {
        let mut k = kernel();
        let mut mb = Mailbox::new(&mut k).unwrap();
        mb.send(&mut k, 1u32).unwrap();
        assert_eq!(mb.send(&mut k, 2), Err(KernelError::MailboxFull));
        assert_eq!(mb.lost(), 1);
        assert_eq!(k.semaphore_value(mb.semaphore()), 1);
        assert_eq!(mb.recv(&mut k), Some(2));
    }

    #[test]
    fn test_recv_blocks_until_send() {
        let mut k = kernel();
        let mut mb = Mailbox::new(&mut k).unwrap();
        assert_eq!(mb.recv(&mut k), None);
        assert_eq!(k.schedule(), 1);

        mb.send(&mut k, 5u32).unwrap();
        assert_eq!(k.schedule(), 0);
        assert_eq!(mb.take(), Some(5));
    }
}
