//! Device allocations owned by the CUDA backend

#[cfg(feature = "cuda")]
use crate::backend::{BufferHandle, TransferDirection};
#[cfg(feature = "cuda")]
use crate::error::{BackendError, Result};
#[cfg(feature = "cuda")]
use cudarc::driver::{CudaDevice, CudaSlice, DevicePtr};
#[cfg(feature = "cuda")]
use std::collections::HashMap;
#[cfg(feature = "cuda")]
use std::sync::Arc;

/// One `cuMemAlloc` region and the byte length the caller asked for
#[cfg(feature = "cuda")]
struct CudaAllocation {
    slice: CudaSlice<u8>,
    len: usize,
}

#[cfg(feature = "cuda")]
impl CudaAllocation {
    fn check_fits(&self, bytes: usize) -> Result<()> {
        if bytes > self.len {
            return Err(BackendError::BufferOutOfBounds {
                offset: 0,
                size: bytes,
                buffer_size: self.len,
            });
        }
        Ok(())
    }
}

/// Handle table over device allocations on one CUDA context
///
/// Dropping an entry drops its `CudaSlice`, which frees the device memory.
#[cfg(feature = "cuda")]
pub struct CudaMemoryManager {
    device: Arc<CudaDevice>,
    allocations: HashMap<u64, CudaAllocation>,
    next_id: u64,
}

#[cfg(feature = "cuda")]
impl CudaMemoryManager {
    pub fn new(device: Arc<CudaDevice>) -> Self {
        Self {
            device,
            allocations: HashMap::new(),
            next_id: 1,
        }
    }

    fn get(&self, handle: BufferHandle) -> Result<&CudaAllocation> {
        self.allocations
            .get(&handle.id())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))
    }

    /// Allocate `len` zeroed bytes
    ///
    /// A zero-length stream still gets a one-byte region so that its handle
    /// has a valid device pointer; the recorded length stays zero.
    pub fn allocate_buffer(&mut self, len: usize) -> Result<BufferHandle> {
        let slice = self
            .device
            .alloc_zeros::<u8>(len.max(1))
            .map_err(|e| BackendError::allocation_failed(len, format!("cuMemAlloc failed: {e}")))?;

        let handle = BufferHandle::new(self.next_id);
        self.next_id += 1;
        self.allocations.insert(handle.id(), CudaAllocation { slice, len });
        tracing::trace!(handle = handle.id(), len, "cuda_buffer_allocated");
        Ok(handle)
    }

    pub fn free_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        match self.allocations.remove(&handle.id()) {
            Some(_) => Ok(()),
            None => Err(BackendError::InvalidBufferHandle(handle.id())),
        }
    }

    /// Synchronous host-to-device copy into the front of the allocation
    pub fn copy_to_buffer(&mut self, handle: BufferHandle, data: &[u8]) -> Result<()> {
        let allocation = self
            .allocations
            .get_mut(&handle.id())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))?;
        allocation.check_fits(data.len())?;
        if data.is_empty() {
            return Ok(());
        }

        let mut dst = allocation.slice.slice_mut(0..data.len());
        self.device
            .htod_sync_copy_into(data, &mut dst)
            .map_err(|e| BackendError::transfer_failed(TransferDirection::HostToDevice, data.len(), e.to_string()))
    }

    /// Synchronous device-to-host copy from the front of the allocation
    pub fn copy_from_buffer(&self, handle: BufferHandle, data: &mut [u8]) -> Result<()> {
        let allocation = self.get(handle)?;
        allocation.check_fits(data.len())?;
        if data.is_empty() {
            return Ok(());
        }

        let src = allocation.slice.slice(0..data.len());
        self.device
            .dtoh_sync_copy_into(&src, data)
            .map_err(|e| BackendError::transfer_failed(TransferDirection::DeviceToHost, data.len(), e.to_string()))
    }

    pub fn buffer_size(&self, handle: BufferHandle) -> Result<usize> {
        Ok(self.get(handle)?.len)
    }

    /// `CUdeviceptr` of the allocation, as handed to kernels
    pub fn device_address(&self, handle: BufferHandle) -> Result<u64> {
        Ok(*self.get(handle)?.slice.device_ptr())
    }
}
