//! Device context
//!
//! A [`Device`] owns the backend that streams allocate from. Clones share the
//! same backend, so every stream built from one device lives in the same
//! device memory space.
//!
//! # Backend Selection
//!
//! ```rust
//! use mdstream_core::{BackendType, Device};
//!
//! # fn main() -> mdstream_core::Result<()> {
//! // CPU reference backend (always available)
//! let device = Device::new_with_backend(BackendType::Cpu)?;
//!
//! // CUDA if present, otherwise CPU
//! let auto = Device::new_auto()?;
//! # Ok(())
//! # }
//! ```

use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::stream::ResidentStream;
use bytemuck::Pod;
use mdstream_backends::{Backend, BackendType, CpuBackend};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "cuda")]
use mdstream_backends::CudaBackend;

/// Backend shared between a device and the streams allocated from it
pub type SharedBackend = Arc<RwLock<Box<dyn Backend + Send + Sync>>>;

/// Handle to a device memory space
#[derive(Clone)]
pub struct Device {
    backend: SharedBackend,
    backend_type: BackendType,
}

impl Device {
    /// Device backed by the CPU reference backend with unlimited memory
    pub fn cpu() -> Self {
        Self::from_backend(Box::new(CpuBackend::new()))
    }

    /// Create a device with the specified backend
    ///
    /// `BackendType::Auto` behaves like [`Device::new_auto`].
    #[tracing::instrument]
    pub fn new_with_backend(backend_type: BackendType) -> Result<Self> {
        Self::from_config(&DeviceConfig {
            backend: backend_type,
            ..DeviceConfig::default()
        })
    }

    /// Create a device, preferring CUDA and falling back to CPU
    #[tracing::instrument]
    pub fn new_auto() -> Result<Self> {
        Self::from_config(&DeviceConfig::default())
    }

    /// Create a device from configuration
    #[tracing::instrument]
    pub fn from_config(config: &DeviceConfig) -> Result<Self> {
        let start = std::time::Instant::now();

        let device = match config.backend {
            BackendType::Cpu => Self::cpu_from_config(config),
            BackendType::Cuda => Self::cuda(config.ordinal)?,
            BackendType::Auto => match Self::cuda(config.ordinal) {
                Ok(device) => {
                    tracing::info!(ordinal = config.ordinal, "Auto-selected CUDA backend");
                    device
                }
                Err(e) => {
                    tracing::info!(reason = %e, "Auto-selected CPU backend (fallback)");
                    Self::cpu_from_config(config)
                }
            },
        };

        tracing::debug!(
            duration_us = start.elapsed().as_micros() as u64,
            backend = %device.backend_type,
            "device_created"
        );
        Ok(device)
    }

    /// Wrap an existing backend
    ///
    /// Useful for handing a [`CpuBackend`] clone to a device while keeping
    /// another clone to inspect device memory.
    pub fn from_backend(backend: Box<dyn Backend + Send + Sync>) -> Self {
        let backend_type = match backend.name() {
            "cuda" => BackendType::Cuda,
            _ => BackendType::Cpu,
        };
        Self {
            backend: Arc::new(RwLock::new(backend)),
            backend_type,
        }
    }

    fn cpu_from_config(config: &DeviceConfig) -> Self {
        match config.cpu_capacity_bytes {
            Some(capacity) => Self::from_backend(Box::new(CpuBackend::with_capacity(capacity))),
            None => Self::cpu(),
        }
    }

    #[cfg(feature = "cuda")]
    fn cuda(ordinal: usize) -> Result<Self> {
        let backend = CudaBackend::with_ordinal(ordinal)
            .map_err(|e| Error::InvalidOperation(format!("Failed to create CUDA backend: {e}")))?;
        Ok(Self::from_backend(Box::new(backend)))
    }

    #[cfg(not(feature = "cuda"))]
    fn cuda(_ordinal: usize) -> Result<Self> {
        Err(Error::InvalidOperation(
            "CUDA backend requires 'cuda' feature to be enabled".into(),
        ))
    }

    /// Backend actually in use (never `Auto`)
    pub fn backend_type(&self) -> BackendType {
        self.backend_type
    }

    /// Shared backend handle
    pub fn backend(&self) -> SharedBackend {
        Arc::clone(&self.backend)
    }

    /// Allocate a stream of `sub_streams` sub-streams of `length` elements
    ///
    /// Shorthand for [`ResidentStream::new`].
    pub fn stream<T: Pod>(&self, length: usize, sub_streams: usize, name: &str) -> Result<ResidentStream<T>> {
        ResidentStream::new(self, length, sub_streams, name)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("backend_type", &self.backend_type)
            .finish()
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::cpu()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_device() {
        let device = Device::new_with_backend(BackendType::Cpu).unwrap();
        assert_eq!(device.backend_type(), BackendType::Cpu);
        assert_eq!(device.backend().read().name(), "cpu");
    }

    #[test]
    fn test_auto_never_reports_auto() {
        let device = Device::new_auto().unwrap();
        assert_ne!(device.backend_type(), BackendType::Auto);
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_without_feature_is_an_error() {
        assert!(Device::new_with_backend(BackendType::Cuda).is_err());
    }

    #[test]
    fn test_capacity_from_config() {
        let device = Device::from_config(&DeviceConfig {
            backend: BackendType::Cpu,
            cpu_capacity_bytes: Some(256),
            ..DeviceConfig::default()
        })
        .unwrap();

        assert!(device.stream::<f32>(16, 4, "fits").is_ok());
        let err = device.stream::<f32>(16, 5, "too_big").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Allocation);
    }

    #[test]
    fn test_clones_share_the_backend() {
        let device = Device::cpu();
        let clone = device.clone();
        let _stream = clone.stream::<u8>(1, 1, "x").unwrap();
        assert!(Arc::ptr_eq(&device.backend(), &clone.backend()));
    }
}
