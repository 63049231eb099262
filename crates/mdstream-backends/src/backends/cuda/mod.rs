//! CUDA backend implementation for NVIDIA GPUs
//!
//! Device buffers live in GPU global memory and are moved with blocking
//! `cuMemcpy` transfers. Kernels are launched elsewhere; this backend only
//! manages the memory they read and write.
//!
//! # Architecture
//!
//! ```text
//! CudaBackend
//! ├── Device          - CUDA GPU device (by ordinal)
//! └── MemoryManager   - GPU buffers
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use mdstream_backends::{Backend, CudaBackend};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut backend = CudaBackend::new()?;
//!
//! let buffer = backend.allocate_buffer(1024)?;
//! let pointer = backend.device_address(buffer)?;
//!
//! backend.free_buffer(buffer)?;
//! # Ok(())
//! # }
//! ```

mod memory;

use crate::error::{BackendError, Result};

#[cfg(feature = "cuda")]
use crate::backend::{Backend, BufferHandle};
#[cfg(feature = "cuda")]
use parking_lot::RwLock;
#[cfg(feature = "cuda")]
use std::sync::Arc;

#[cfg(feature = "cuda")]
use cudarc::driver::CudaDevice;

#[cfg(feature = "cuda")]
use memory::CudaMemoryManager;

/// CUDA backend for device-resident stream storage
#[cfg(feature = "cuda")]
pub struct CudaBackend {
    /// CUDA device (GPU)
    device: Arc<CudaDevice>,

    /// Memory manager (GPU buffers)
    memory: Arc<RwLock<CudaMemoryManager>>,
}

#[cfg(feature = "cuda")]
impl CudaBackend {
    /// Create a CUDA backend on device 0
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No CUDA device is available
    /// - CUDA initialization fails
    pub fn new() -> Result<Self> {
        Self::with_ordinal(0)
    }

    /// Create a CUDA backend on the device with the given ordinal
    pub fn with_ordinal(ordinal: usize) -> Result<Self> {
        let device = CudaDevice::new(ordinal).map_err(|e| {
            BackendError::Other(format!(
                "CUDA device {ordinal} not found or initialization failed: {e}"
            ))
        })?;

        let memory = Arc::new(RwLock::new(CudaMemoryManager::new(Arc::clone(&device))));
        tracing::info!(ordinal, name = ?device.name().ok(), "cuda_backend_created");

        Ok(Self { device, memory })
    }

    /// Check if CUDA is available on this system
    pub fn is_available() -> bool {
        CudaDevice::new(0).is_ok()
    }

    /// Underlying cudarc device, for kernel layers that launch against this memory
    pub fn device(&self) -> Arc<CudaDevice> {
        Arc::clone(&self.device)
    }
}

#[cfg(feature = "cuda")]
impl Backend for CudaBackend {
    fn name(&self) -> &'static str {
        "cuda"
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
        self.memory.read().copy_from_buffer(handle, data)
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

/// Placeholder when the `cuda` feature is disabled
#[cfg(not(feature = "cuda"))]
pub struct CudaBackend;

#[cfg(not(feature = "cuda"))]
impl CudaBackend {
    pub fn new() -> Result<Self> {
        Self::with_ordinal(0)
    }

    pub fn with_ordinal(_ordinal: usize) -> Result<Self> {
        Err(BackendError::unsupported("CUDA backend requires 'cuda' feature to be enabled"))
    }

    pub fn is_available() -> bool {
        false
    }
}
