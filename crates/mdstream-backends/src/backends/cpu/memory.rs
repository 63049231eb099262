//! Memory manager for the CPU backend
//!
//! Device buffers are heap allocations keyed by handle. The manager can be
//! given a capacity to model a device with finite memory, and a one-shot
//! transfer fault can be armed to exercise copy-failure paths.

use crate::backend::{BufferHandle, TransferDirection};
use crate::error::{BackendError, Result};
use std::collections::HashMap;

/// Memory manager for CPU backend buffers
pub struct MemoryManager {
    /// Buffers storage (handle -> bytes)
    buffers: HashMap<u64, Vec<u8>>,

    /// Next buffer handle ID
    next_buffer_id: u64,

    /// Simulated device capacity in bytes (None = unlimited)
    capacity: Option<usize>,

    /// Bytes currently held by live buffers
    bytes_in_use: usize,

    /// Armed copy fault, consumed by the next copy in that direction
    transfer_fault: Option<TransferDirection>,
}

impl MemoryManager {
    /// Create a memory manager with unlimited capacity
    pub fn new() -> Self {
        Self {
            buffers: HashMap::new(),
            next_buffer_id: 1,
            capacity: None,
            bytes_in_use: 0,
            transfer_fault: None,
        }
    }

    /// Create a memory manager that refuses allocations beyond `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new()
        }
    }

    /// Allocate a zeroed buffer
    pub fn allocate_buffer(&mut self, size: usize) -> Result<BufferHandle> {
        if let Some(capacity) = self.capacity {
            let available = capacity.saturating_sub(self.bytes_in_use);
            if size > available {
                tracing::debug!(requested = size, available, capacity, "cpu_device_out_of_memory");
                return Err(BackendError::allocation_failed(
                    size,
                    format!("out of device memory ({available} of {capacity} bytes free)"),
                ));
            }
        }

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(size)
            .map_err(|e| BackendError::allocation_failed(size, e.to_string()))?;
        storage.resize(size, 0u8);

        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        self.bytes_in_use += size;
        self.buffers.insert(id, storage);

        Ok(BufferHandle::new(id))
    }

    /// Free a buffer
    pub fn free_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        let storage = self
            .buffers
            .remove(&handle.id())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))?;
        self.bytes_in_use -= storage.len();
        Ok(())
    }

    /// Copy data to the start of a buffer
    pub fn copy_to_buffer(&mut self, handle: BufferHandle, data: &[u8]) -> Result<()> {
        let fault = self.take_fault(TransferDirection::HostToDevice);
        let buffer = self
            .buffers
            .get_mut(&handle.id())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))?;

        if data.len() > buffer.len() {
            return Err(BackendError::BufferOutOfBounds {
                offset: 0,
                size: data.len(),
                buffer_size: buffer.len(),
            });
        }

        if fault {
            return Err(BackendError::transfer_failed(
                TransferDirection::HostToDevice,
                data.len(),
                "injected transfer fault",
            ));
        }

        buffer[..data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Copy data from the start of a buffer
    pub fn copy_from_buffer(&mut self, handle: BufferHandle, data: &mut [u8]) -> Result<()> {
        let fault = self.take_fault(TransferDirection::DeviceToHost);
        let buffer = self
            .buffers
            .get(&handle.id())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))?;

        if data.len() > buffer.len() {
            return Err(BackendError::BufferOutOfBounds {
                offset: 0,
                size: data.len(),
                buffer_size: buffer.len(),
            });
        }

        if fault {
            return Err(BackendError::transfer_failed(
                TransferDirection::DeviceToHost,
                data.len(),
                "injected transfer fault",
            ));
        }

        data.copy_from_slice(&buffer[..data.len()]);
        Ok(())
    }

    /// Get buffer size in bytes
    pub fn buffer_size(&self, handle: BufferHandle) -> Result<usize> {
        self.buffers
            .get(&handle.id())
            .map(|b| b.len())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))
    }

    /// Address of the first byte of a buffer
    pub fn device_address(&self, handle: BufferHandle) -> Result<u64> {
        self.buffers
            .get(&handle.id())
            .map(|b| b.as_ptr() as u64)
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))
    }

    /// Borrow the raw contents of a buffer
    pub fn buffer_bytes(&self, handle: BufferHandle) -> Result<&[u8]> {
        self.buffers
            .get(&handle.id())
            .map(|b| b.as_slice())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))
    }

    /// Mutably borrow the raw contents of a buffer
    pub fn buffer_bytes_mut(&mut self, handle: BufferHandle) -> Result<&mut [u8]> {
        self.buffers
            .get_mut(&handle.id())
            .map(|b| b.as_mut_slice())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))
    }

    /// Number of live buffers
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Bytes held by live buffers
    pub fn bytes_in_use(&self) -> usize {
        self.bytes_in_use
    }

    /// Arm a one-shot fault for the next copy in `direction`
    pub fn inject_transfer_fault(&mut self, direction: TransferDirection) {
        self.transfer_fault = Some(direction);
    }

    fn take_fault(&mut self, direction: TransferDirection) -> bool {
        if self.transfer_fault == Some(direction) {
            self.transfer_fault = None;
            true
        } else {
            false
        }
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_free_tracks_usage() {
        let mut mm = MemoryManager::new();
        let a = mm.allocate_buffer(128).unwrap();
        let b = mm.allocate_buffer(64).unwrap();
        assert_ne!(a, b);
        assert_eq!(mm.live_buffers(), 2);
        assert_eq!(mm.bytes_in_use(), 192);

        mm.free_buffer(a).unwrap();
        assert_eq!(mm.live_buffers(), 1);
        assert_eq!(mm.bytes_in_use(), 64);

        assert!(matches!(mm.free_buffer(a), Err(BackendError::InvalidBufferHandle(_))));
    }

    #[test]
    fn test_capacity_limit() {
        let mut mm = MemoryManager::with_capacity(256);
        let a = mm.allocate_buffer(200).unwrap();
        let err = mm.allocate_buffer(100).unwrap_err();
        assert!(matches!(err, BackendError::AllocationFailed { requested: 100, .. }));
        assert_eq!(mm.live_buffers(), 1);

        mm.free_buffer(a).unwrap();
        assert!(mm.allocate_buffer(256).is_ok());
    }

    #[test]
    fn test_new_buffers_are_zeroed() {
        let mut mm = MemoryManager::new();
        let handle = mm.allocate_buffer(32).unwrap();
        assert!(mm.buffer_bytes(handle).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_partial_copy_leaves_tail_untouched() {
        let mut mm = MemoryManager::new();
        let handle = mm.allocate_buffer(8).unwrap();
        mm.copy_to_buffer(handle, &[9u8; 8]).unwrap();
        mm.copy_to_buffer(handle, &[1, 2, 3]).unwrap();
        assert_eq!(mm.buffer_bytes(handle).unwrap(), &[1, 2, 3, 9, 9, 9, 9, 9]);

        let mut out = [0u8; 4];
        mm.copy_from_buffer(handle, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 9]);
    }

    #[test]
    fn test_oversized_copy_rejected() {
        let mut mm = MemoryManager::new();
        let handle = mm.allocate_buffer(4).unwrap();
        assert!(matches!(
            mm.copy_to_buffer(handle, &[0u8; 5]),
            Err(BackendError::BufferOutOfBounds { .. })
        ));
        let mut out = [0u8; 5];
        assert!(mm.copy_from_buffer(handle, &mut out).is_err());
    }

    #[test]
    fn test_injected_fault_is_one_shot_and_atomic() {
        let mut mm = MemoryManager::new();
        let handle = mm.allocate_buffer(4).unwrap();
        mm.copy_to_buffer(handle, &[7u8; 4]).unwrap();

        mm.inject_transfer_fault(TransferDirection::HostToDevice);
        let err = mm.copy_to_buffer(handle, &[1u8; 4]).unwrap_err();
        assert!(matches!(err, BackendError::TransferFailed { bytes: 4, .. }));
        assert_eq!(mm.buffer_bytes(handle).unwrap(), &[7u8; 4]);

        mm.copy_to_buffer(handle, &[1u8; 4]).unwrap();
        assert_eq!(mm.buffer_bytes(handle).unwrap(), &[1u8; 4]);
    }

    #[test]
    fn test_fault_only_hits_matching_direction() {
        let mut mm = MemoryManager::new();
        let handle = mm.allocate_buffer(4).unwrap();
        mm.inject_transfer_fault(TransferDirection::DeviceToHost);

        mm.copy_to_buffer(handle, &[3u8; 4]).unwrap();
        let mut out = [0u8; 4];
        assert!(mm.copy_from_buffer(handle, &mut out).is_err());
        assert_eq!(out, [0u8; 4]);
        mm.copy_from_buffer(handle, &mut out).unwrap();
        assert_eq!(out, [3u8; 4]);
    }
}
