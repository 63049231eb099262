//! Error types for backend operations

use crate::backend::TransferDirection;

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors that can occur while managing device memory
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Invalid buffer handle
    #[error("invalid buffer handle: {0}")]
    InvalidBufferHandle(u64),

    /// Buffer access out of bounds
    #[error("buffer access out of bounds: offset {offset} + size {size} > buffer size {buffer_size}")]
    BufferOutOfBounds {
        offset: usize,
        size: usize,
        buffer_size: usize,
    },

    /// The device allocator could not satisfy a request
    #[error("device allocation of {requested} bytes failed: {reason}")]
    AllocationFailed { requested: usize, reason: String },

    /// A copy between host and device failed
    #[error("{direction} copy of {bytes} bytes failed: {reason}")]
    TransferFailed {
        direction: TransferDirection,
        bytes: usize,
        reason: String,
    },

    /// Unsupported operation
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Create an allocation failure
    pub fn allocation_failed(requested: usize, reason: impl Into<String>) -> Self {
        Self::AllocationFailed {
            requested,
            reason: reason.into(),
        }
    }

    /// Create a transfer failure
    pub fn transfer_failed(direction: TransferDirection, bytes: usize, reason: impl Into<String>) -> Self {
        Self::TransferFailed {
            direction,
            bytes,
            reason: reason.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }
}
