//! Error types for the replication core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors returned by the send monitor and its configuration.
///
/// Registry misuse (releasing the registry's own reference, inserting a
/// duplicate id) is a broken invariant and panics instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The wait queue has no free slot.
    #[error("send monitor wait queue is full")]
    CapacityExceeded,

    /// The monitor has been closed.
    #[error("send monitor is closed")]
    Closed,

    /// A waiting ticket was cancelled by another thread.
    #[error("wait interrupted")]
    Interrupted,

    /// The ticket to interrupt is not waiting.
    ///
    /// It may have been admitted, may have left, or may have been
    /// interrupted already. These cases cannot be told apart.
    #[error("ticket is not waiting")]
    NotFound,

    /// Queue length is zero or not a power of two.
    #[error("invalid queue length {len}: must be a non-zero power of two")]
    InvalidQueueLength {
        /// The rejected length.
        len: usize,
    },

    /// Concurrency must allow at least one holder.
    #[error("invalid concurrency {concurrency}: must be at least 1")]
    InvalidConcurrency {
        /// The rejected concurrency.
        concurrency: usize,
    },
}

impl CoreError {
    /// Returns true if the caller may retry the operation.
    ///
    /// A full queue drains as holders leave, and an interrupted caller
    /// may schedule again. A closed monitor never reopens.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::CapacityExceeded | CoreError::Interrupted)
    }
}
