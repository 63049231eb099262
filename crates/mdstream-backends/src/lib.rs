//! Device memory backends for dual-resident molecular-dynamics streams
//!
//! This crate provides:
//! - **Backend Trait**: The device allocator boundary (allocate/free/copy in both directions)
//! - **CPU Backend**: Reference implementation with host-simulated device memory
//! - **CUDA Backend**: NVIDIA GPU memory via cudarc (requires the `cuda` feature)
//! - **Launch Geometry**: Grid/block dimensions used to size kernel launches
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 mdstream-core streams                    │
//! │         (host mirror + sub-stream view table)            │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │ allocate / free / copy H2D / copy D2H
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                     Backend Trait                        │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!              ┌────────┴────────┐
//!              ▼                 ▼
//!        ┌─────────┐       ┌─────────┐
//!        │   CPU   │       │  CUDA   │
//!        │ Backend │       │ Backend │
//!        └─────────┘       └─────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use mdstream_backends::{Backend, CpuBackend};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut backend = CpuBackend::new();
//!
//! let buffer = backend.allocate_buffer(16)?;
//! let data = vec![1.0f32, 2.0, 3.0, 4.0];
//! backend.copy_to_buffer(buffer, bytemuck::cast_slice(&data))?;
//!
//! let mut results = vec![0.0f32; 4];
//! backend.copy_from_buffer(buffer, bytemuck::cast_slice_mut(&mut results))?;
//! assert_eq!(results, data);
//!
//! backend.free_buffer(buffer)?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod backends;
pub mod error;

// Re-export public API
pub use backend::{
    Backend, BackendType, BlockDim, BufferHandle, GridDim, LaunchConfig, TransferDirection,
};
pub use backends::{CpuBackend, CudaBackend};
pub use error::{BackendError, Result};
