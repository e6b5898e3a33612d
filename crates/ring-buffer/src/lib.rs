//! Bounded Ring Buffer
//!
//! Fixed-capacity, thread-safe store of the most recent entries. A single
//! lock guards the slots and indices so snapshots never observe a half-done
//! insert.

mod buffer;

pub use buffer::{RingBuffer, DEFAULT_CAPACITY};

use thiserror::Error;

/// Errors raised when building a ring buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingBufferError {
    /// Capacity must be at least one slot
    #[error("Ring buffer capacity must be greater than 0")]
    ZeroCapacity,
}
