//! Backend implementations for different memory targets
//!
//! This module contains:
//! - `cpu` - CPU backend (reference implementation, host-simulated device memory)
//! - `cuda` - CUDA GPU backend (NVIDIA GPUs)

pub mod cpu;
pub mod cuda;

// Re-export backends
pub use cpu::CpuBackend;
pub use cuda::CudaBackend;
