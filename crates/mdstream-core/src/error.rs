//! Error types for mdstream-core operations

use crate::stream::ShapeError;
use mdstream_backends::{BackendError, TransferDirection};
use std::collections::TryReserveError;

/// Result type for mdstream-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Host or device memory could not be obtained
    Allocation,
    /// A host/device copy failed
    Transfer,
    /// Shapes or reshape parameters are inconsistent
    ShapeMismatch,
    /// Anything else (non-resident stream, bad configuration, invalid layout)
    Other,
}

/// Errors that can occur in mdstream-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Device allocator refused the request
    #[error("stream '{stream}': device allocation of {bytes} bytes failed")]
    Allocation {
        stream: String,
        bytes: usize,
        #[source]
        source: BackendError,
    },

    /// Host allocator refused the request
    #[error("stream '{stream}': host allocation of {bytes} bytes failed")]
    HostAllocation {
        stream: String,
        bytes: usize,
        #[source]
        source: TryReserveError,
    },

    /// Host/device copy failed
    #[error("stream '{stream}': {direction} transfer of {bytes} bytes failed")]
    Transfer {
        stream: String,
        direction: TransferDirection,
        bytes: usize,
        #[source]
        source: BackendError,
    },

    /// Shape precondition violated
    #[error("stream '{stream}': {source}")]
    ShapeMismatch {
        stream: String,
        #[source]
        source: ShapeError,
    },

    /// Stream storage was released by `deallocate`
    #[error("stream '{stream}' is not resident")]
    NotResident { stream: String },

    /// Flat index outside the stream extent
    #[error("stream '{stream}': index {index} out of bounds for extent {extent}")]
    IndexOutOfBounds { stream: String, index: usize, extent: usize },

    /// Descriptor references do not cover their declared counts
    #[error("invalid simulation layout: {}", .violations.join("; "))]
    InvalidLayout { violations: Vec<String> },

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Backend error not tied to a specific stream
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl Error {
    /// Failure category
    ///
    /// ```rust
    /// use mdstream_core::{Device, ErrorKind};
    ///
    /// let device = Device::cpu();
    /// let err = device.stream::<f32>(8, 0, "bad").unwrap_err();
    /// assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Allocation { .. } | Error::HostAllocation { .. } => ErrorKind::Allocation,
            Error::Transfer { .. } => ErrorKind::Transfer,
            Error::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            Error::Backend(BackendError::AllocationFailed { .. }) => ErrorKind::Allocation,
            Error::Backend(BackendError::TransferFailed { .. }) => ErrorKind::Transfer,
            _ => ErrorKind::Other,
        }
    }

    pub(crate) fn shape(stream: &str, source: ShapeError) -> Self {
        Error::ShapeMismatch {
            stream: stream.to_string(),
            source,
        }
    }

    pub(crate) fn not_resident(stream: &str) -> Self {
        Error::NotResident {
            stream: stream.to_string(),
        }
    }
}
