//! Backend trait for device memory management
//!
//! This trait is the device allocator boundary. Streams are defined purely in
//! terms of these operations plus ordinary host heap allocation; they make no
//! other assumptions about the underlying device API.

use super::types::BufferHandle;
use crate::error::Result;

/// Backend trait for device memory
///
/// Backends implement this trait to expose linear device memory on a given
/// target (a host-simulated device for the CPU backend, GPU global memory for
/// CUDA).
///
/// # Architecture
///
/// ```text
/// ┌─────────────────────────────────────────────────────────┐
/// │                     Backend Trait                        │
/// │  - allocate_buffer() / free_buffer()                     │
/// │  - copy_to_buffer()   (host → device, blocking)          │
/// │  - copy_from_buffer() (device → host, blocking)          │
/// │  - device_address()   (for kernel parameter blocks)      │
/// └─────────────────────┬───────────────────────────────────┘
///              ┌────────┴────────┐
///              ▼                 ▼
///        ┌─────────┐       ┌─────────┐
///        │   CPU   │       │  CUDA   │
///        └─────────┘       └─────────┘
/// ```
///
/// # Ordering
///
/// Every operation is synchronous with respect to the calling thread. Data
/// written by `copy_to_buffer` is visible to any kernel launched after the call
/// returns; `copy_from_buffer` observes every kernel launched before it.
///
/// # Usage
///
/// ```rust
/// use mdstream_backends::{Backend, CpuBackend};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut backend = CpuBackend::new();
///
/// let buffer = backend.allocate_buffer(1024)?;
/// assert_eq!(backend.buffer_size(buffer)?, 1024);
///
/// let data = vec![1.0f32, 2.0, 3.0, 4.0];
/// backend.copy_to_buffer(buffer, bytemuck::cast_slice(&data))?;
///
/// let mut results = vec![0.0f32; 4];
/// backend.copy_from_buffer(buffer, bytemuck::cast_slice_mut(&mut results))?;
/// assert_eq!(results, data);
///
/// backend.free_buffer(buffer)?;
/// # Ok(())
/// # }
/// ```
pub trait Backend {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    // ============================================================================================
    // Buffer Management
    // ============================================================================================

    /// Allocate a zero-initialised device buffer of the given size in bytes
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::AllocationFailed`](crate::BackendError::AllocationFailed)
    /// if the device cannot satisfy the request. No memory is retained on failure.
    fn allocate_buffer(&mut self, size: usize) -> Result<BufferHandle>;

    /// Free a previously allocated buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer handle is invalid.
    fn free_buffer(&mut self, handle: BufferHandle) -> Result<()>;

    /// Copy data from host to the start of a device buffer
    ///
    /// The copy is all-or-nothing: on error the device contents are unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Buffer handle is invalid
    /// - Data size exceeds buffer size
    /// - The device reports a copy fault
    fn copy_to_buffer(&mut self, handle: BufferHandle, data: &[u8]) -> Result<()>;

    /// Copy data from the start of a device buffer to host
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Buffer handle is invalid
    /// - Destination size exceeds buffer size
    /// - The device reports a copy fault
    fn copy_from_buffer(&mut self, handle: BufferHandle, data: &mut [u8]) -> Result<()>;

    /// Get buffer size in bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer handle is invalid.
    fn buffer_size(&self, handle: BufferHandle) -> Result<usize>;

    /// Raw device address of the first byte of a buffer
    ///
    /// This is the value kernels receive as a pointer argument. It stays valid
    /// until the buffer is freed.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer handle is invalid.
    fn device_address(&self, handle: BufferHandle) -> Result<u64>;

    // ============================================================================================
    // Type Introspection
    // ============================================================================================

    /// Downcast backend to &dyn Any for type-specific access
    fn as_any(&self) -> &dyn std::any::Any;

    /// Downcast backend to &mut dyn Any for type-specific access
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
