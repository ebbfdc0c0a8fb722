//! # FIFO Queue
//!
//! Fixed-capacity ring buffer for one producer (typically an event callback
//! or interrupt) and one consumer thread. A block-mode semaphore counts the
//! items available to the consumer:
//!
//! - `put` never blocks: when the buffer is full the item is dropped, the
//!   lost-data counter is incremented and [`KernelError::FifoFull`] is
//!   returned.
//! - `get` waits on the semaphore. If the FIFO is empty the consumer blocks;
//!   the next `put` wakes it, and once it runs again it reads the item with
//!   [`Fifo::take`].
//!
//! One producer and one consumer is a usage contract and is not enforced.
//! Every call needs exclusive access to the scheduler and the FIFO, which
//! the firmware gets from a critical section.

use log::warn;

use crate::error::{KernelError, KernelResult};
use crate::scheduler::Scheduler;
use crate::semaphore::{SemaphoreId, WaitOutcome, WaitPolicy};

pub struct Fifo<T: Copy + Default, const N: usize> {
    buffer: [T; N],
    put_index: usize,
    get_index: usize,
    /// Items in the buffer, including one already handed to a woken
    /// consumer but not yet taken.
    count: usize,
    size: SemaphoreId,
    lost: u32,
}

impl<T: Copy + Default, const N: usize> Fifo<T, N> {
    /// Create an empty FIFO, allocating its size semaphore.
    ///
    /// # Errors
    /// [`KernelError::TooManySemaphores`] when the semaphore table is full.
    pub fn new(kernel: &mut Scheduler) -> KernelResult<Self> {
        let size = kernel.create_semaphore(0, WaitPolicy::Block)?;
        Ok(Self {
            buffer: [T::default(); N],
            put_index: 0,
            get_index: 0,
            count: 0,
            size,
            lost: 0,
        })
    }

    /// Append an item without blocking.
    ///
    /// # Errors
    /// [`KernelError::FifoFull`] if there is no room; the item is dropped.
    pub fn put(&mut self, kernel: &mut Scheduler, item: T) -> KernelResult<()> {
        if self.count == N {
            self.lost = self.lost.wrapping_add(1);
            warn!("fifo full, {} items lost", self.lost);
            return Err(KernelError::FifoFull);
        }

        self.buffer[self.put_index] = item;
        self.put_index = (self.put_index + 1) % N;
        self.count += 1;
        kernel.signal(self.size);
        Ok(())
    }

    /// Wait for an item on behalf of the running thread.
    ///
    /// Returns the item if one was available. Otherwise returns `None`:
    /// for a blocked thread the caller must suspend and, once resumed, call
    /// [`Fifo::take`]; under strict round robin the thread is not blocked
    /// and simply calls `get` again later.
    pub fn get(&mut self, kernel: &mut Scheduler) -> Option<T> {
        match kernel.wait(self.size) {
            WaitOutcome::Acquired => Some(self.take()),
            WaitOutcome::Blocked | WaitOutcome::Spin => None,
        }
    }

    /// Read the item the consumer was granted by a completed wait.
    pub fn take(&mut self) -> T {
        debug_assert!(self.count > 0, "take without a granted item");
        let item = self.buffer[self.get_index];
        self.get_index = (self.get_index + 1) % N;
        self.count -= 1;
        item
    }

    /// Items currently stored.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of items dropped because the FIFO was full.
    pub fn lost(&self) -> u32 {
        self.lost
    }

    /// The semaphore counting available items.
    pub fn semaphore(&self) -> SemaphoreId {
        self.size
    }
}
