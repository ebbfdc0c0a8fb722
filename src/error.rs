//! Kernel error taxonomy.
//!
//! Configuration errors are reported synchronously to the registration
//! call. Resource exhaustion (a full FIFO or mailbox) drops the item and is
//! reported through the same type. Protocol violations such as using a
//! semaphore id that was never created are preconditions and are not
//! represented here.

use thiserror::Error;

/// Errors returned by kernel operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KernelError {
    /// Registration or launch was attempted with no threads.
    #[error("no threads registered")]
    NoThreads,
    /// More threads than `MAX_THREADS` were supplied.
    #[error("thread table is full")]
    TooManyThreads,
    /// `register_threads` was called a second time.
    #[error("threads are already registered")]
    AlreadyRegistered,
    /// A priority above `MAX_PRIORITY` was supplied.
    #[error("priority out of range")]
    InvalidPriority,
    /// The kernel has been launched; the configuration is frozen.
    #[error("kernel already launched")]
    AlreadyLaunched,
    /// The semaphore table is full.
    #[error("semaphore table is full")]
    TooManySemaphores,
    /// The periodic event table is full.
    #[error("event table is full")]
    TooManyEvents,
    /// A periodic event was declared with a zero period.
    #[error("event period must be non-zero")]
    InvalidPeriod,
    /// The time slice does not fit the 24-bit SysTick reload register.
    #[error("time slice out of range")]
    InvalidTimeSlice,
    /// The FIFO was full; the item was dropped and counted as lost.
    #[error("fifo is full")]
    FifoFull,
    /// The mailbox already held unread data, which was overwritten.
    #[error("mailbox is full")]
    MailboxFull,
    /// A shared FIFO or mailbox was used before `init`.
    #[error("channel used before init")]
    Uninitialized,
}

/// Result alias used throughout the kernel.
pub type KernelResult<T> = Result<T, KernelError>;
