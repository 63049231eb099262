//! CPU backend implementation
//!
//! Reference implementation of the Backend trait. "Device" memory lives in
//! ordinary heap allocations that are kept strictly separate from the host
//! mirrors owned by streams, so host/device transfers behave exactly as they
//! would across a PCIe bus: nothing becomes visible on the other side until a
//! copy is issued.
//!
//! # Architecture
//!
//! ```text
//! CpuBackend
//! └── MemoryManager  - Device buffers + capacity + fault injection
//! ```
//!
//! # Usage
//!
//! ```rust
//! use mdstream_backends::{Backend, CpuBackend};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 1 MiB simulated device
//! let mut backend = CpuBackend::with_capacity(1 << 20);
//!
//! let buffer = backend.allocate_buffer(1024)?;
//! assert!(backend.allocate_buffer(2 << 20).is_err());
//!
//! backend.free_buffer(buffer)?;
//! # Ok(())
//! # }
//! ```

pub(crate) mod memory;

use crate::backend::{Backend, BufferHandle, TransferDirection};
use crate::error::Result;
use memory::MemoryManager;
use parking_lot::RwLock;
use std::sync::Arc;

/// CPU backend with host-simulated device memory
///
/// Clones share the same memory manager, so a test can keep one clone for
/// inspection (live buffer count, raw device bytes) while another is owned by
/// a device context.
#[derive(Clone)]
pub struct CpuBackend {
    /// Memory manager (device buffers)
    memory: Arc<RwLock<MemoryManager>>,
}

impl CpuBackend {
    /// Create a new CPU backend with unlimited memory
    ///
    /// # Example
    ///
    /// ```rust
    /// use mdstream_backends::CpuBackend;
    ///
    /// let backend = CpuBackend::new();
    /// assert_eq!(backend.live_buffers(), 0);
    /// ```
    pub fn new() -> Self {
        Self {
            memory: Arc::new(RwLock::new(MemoryManager::new())),
        }
    }

    /// Create a CPU backend that models a device with `capacity` bytes of memory
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            memory: Arc::new(RwLock::new(MemoryManager::with_capacity(capacity))),
        }
    }

    /// Number of live device buffers
    pub fn live_buffers(&self) -> usize {
        self.memory.read().live_buffers()
    }

    /// Bytes held by live device buffers
    pub fn bytes_in_use(&self) -> usize {
        self.memory.read().bytes_in_use()
    }

    /// Make the next copy in `direction` fail with a transfer error
    pub fn inject_transfer_fault(&self, direction: TransferDirection) {
        self.memory.write().inject_transfer_fault(direction);
    }

    /// Snapshot of a device buffer's raw bytes
    pub fn read_device_bytes(&self, handle: BufferHandle) -> Result<Vec<u8>> {
        self.memory.read().buffer_bytes(handle).map(|bytes| bytes.to_vec())
    }

    /// Overwrite the start of a device buffer directly, standing in for a kernel write
    pub fn write_device_bytes(&self, handle: BufferHandle, offset: usize, data: &[u8]) -> Result<()> {
        let mut memory = self.memory.write();
        let bytes = memory.buffer_bytes_mut(handle)?;
        let end = offset + data.len();
        if end > bytes.len() {
            return Err(crate::BackendError::BufferOutOfBounds {
                offset,
                size: data.len(),
                buffer_size: bytes.len(),
            });
        }
        bytes[offset..end].copy_from_slice(data);
        Ok(())
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn allocate_buffer(&mut self, size: usize) -> Result<BufferHandle> {
        self.memory.write().allocate_buffer(size)
    }

    fn free_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        self.memory.write().free_buffer(handle)
    }

    fn copy_to_buffer(&mut self, handle: BufferHandle, data: &[u8]) -> Result<()> {
        self.memory.write().copy_to_buffer(handle, data)
    }

    fn copy_from_buffer(&mut self, handle: BufferHandle, data: &mut [u8]) -> Result<()> {
        self.memory.write().copy_from_buffer(handle, data)
    }

    fn buffer_size(&self, handle: BufferHandle) -> Result<usize> {
        self.memory.read().buffer_size(handle)
    }

    fn device_address(&self, handle: BufferHandle) -> Result<u64> {
        self.memory.read().device_address(handle)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_roundtrip() {
        let mut backend = CpuBackend::new();
        let handle = backend.allocate_buffer(16).unwrap();

        let data = [1.5f32, -2.0, 3.25, 4.0];
        backend.copy_to_buffer(handle, bytemuck::cast_slice(&data)).unwrap();

        let mut out = [0.0f32; 4];
        backend
            .copy_from_buffer(handle, bytemuck::cast_slice_mut(&mut out))
            .unwrap();
        assert_eq!(out, data);

        backend.free_buffer(handle).unwrap();
        assert!(backend.buffer_size(handle).is_err());
    }

    #[test]
    fn test_clones_share_memory() {
        let mut backend = CpuBackend::new();
        let observer = backend.clone();

        let handle = backend.allocate_buffer(64).unwrap();
        assert_eq!(observer.live_buffers(), 1);
        assert_eq!(observer.bytes_in_use(), 64);

        observer.write_device_bytes(handle, 60, &[0xAB; 4]).unwrap();
        let bytes = backend.read_device_bytes(handle).unwrap();
        assert_eq!(&bytes[60..], &[0xAB; 4]);
        assert!(observer.write_device_bytes(handle, 62, &[0; 4]).is_err());

        backend.free_buffer(handle).unwrap();
        assert_eq!(observer.live_buffers(), 0);
    }

    #[test]
    fn test_device_address_is_stable() {
        let mut backend = CpuBackend::new();
        let handle = backend.allocate_buffer(256).unwrap();
        let first = backend.device_address(handle).unwrap();
        backend.copy_to_buffer(handle, &[1u8; 256]).unwrap();
        assert_eq!(backend.device_address(handle).unwrap(), first);
        assert_ne!(first, 0);
    }

    #[test]
    fn test_downcast() {
        let backend: Box<dyn Backend> = Box::new(CpuBackend::new());
        assert_eq!(backend.name(), "cpu");
        assert!(backend.as_any().downcast_ref::<CpuBackend>().is_some());
    }
}
