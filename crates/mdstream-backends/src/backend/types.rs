//! Types for backend selection, handles and launch geometry

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Handle to an allocated device buffer
///
/// Buffers are opaque handles managed by the backend.
/// Use Backend methods to interact with buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

impl BufferHandle {
    /// Create a new buffer handle
    pub const fn new(id: u64) -> Self {
        BufferHandle(id)
    }

    /// Get the internal ID
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf{}", self.0)
    }
}

/// Direction of a host/device copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferDirection {
    /// Host memory to device memory (upload)
    HostToDevice,
    /// Device memory to host memory (download)
    DeviceToHost,
}

impl TransferDirection {
    /// Short label used in logs (`H2D` / `D2H`)
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HostToDevice => "H2D",
            Self::DeviceToHost => "D2H",
        }
    }
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// CUDA if a device is present, otherwise CPU
    #[default]
    Auto,
    /// CPU reference backend (always available)
    Cpu,
    /// CUDA backend (NVIDIA GPUs, requires the `cuda` feature)
    Cuda,
}

impl FromStr for BackendType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => Err(format!("unknown backend '{other}' (expected auto, cpu or cuda)")),
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
        };
        f.write_str(name)
    }
}

/// Grid dimensions for kernel launch, in blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDim {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl GridDim {
    /// Create 1D grid
    pub const fn linear(size: u32) -> Self {
        Self { x: size, y: 1, z: 1 }
    }

    /// Get total number of blocks
    pub const fn total_blocks(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

impl fmt::Display for GridDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Block dimensions, in threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockDim {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl BlockDim {
    /// Create 1D block
    pub const fn linear(size: u32) -> Self {
        Self { x: size, y: 1, z: 1 }
    }

    /// Get total number of threads per block
    pub const fn total_threads(&self) -> u32 {
        self.x * self.y * self.z
    }
}

impl fmt::Display for BlockDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Launch configuration for a kernel family
///
/// One-dimensional grid of blocks, one-dimensional block of threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Grid dimensions (number of blocks)
    pub grid: GridDim,

    /// Block dimensions (threads per block)
    pub block: BlockDim,
}

impl LaunchConfig {
    /// Create a 1D launch of `blocks × threads_per_block`
    pub const fn blocks(blocks: u32, threads_per_block: u32) -> Self {
        Self {
            grid: GridDim::linear(blocks),
            block: BlockDim::linear(threads_per_block),
        }
    }

    /// Get total number of threads across all blocks
    pub const fn total_threads(&self) -> u64 {
        self.grid.total_blocks() * self.block.total_threads() as u64
    }
}

impl fmt::Display for LaunchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grid={}, block={}", self.grid, self.block)
    }
}

// ================================================================================================
// Tests
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_handle() {
        let handle = BufferHandle::new(42);
        assert_eq!(handle.id(), 42);
        assert_eq!(handle.to_string(), "buf42");
    }

    #[test]
    fn test_transfer_direction_labels() {
        assert_eq!(TransferDirection::HostToDevice.to_string(), "H2D");
        assert_eq!(TransferDirection::DeviceToHost.to_string(), "D2H");
    }

    #[test]
    fn test_backend_type_parse() {
        assert_eq!("cpu".parse::<BackendType>().unwrap(), BackendType::Cpu);
        assert_eq!(" CUDA ".parse::<BackendType>().unwrap(), BackendType::Cuda);
        assert_eq!("gpu".parse::<BackendType>().unwrap(), BackendType::Cuda);
        assert_eq!("auto".parse::<BackendType>().unwrap(), BackendType::Auto);
        assert!("metal".parse::<BackendType>().is_err());
        assert_eq!(BackendType::default(), BackendType::Auto);
    }

    #[test]
    fn test_backend_type_serde() {
        let json = serde_json::to_string(&BackendType::Cuda).unwrap();
        assert_eq!(json, "\"cuda\"");
        let parsed: BackendType = serde_json::from_str("\"cpu\"").unwrap();
        assert_eq!(parsed, BackendType::Cpu);
    }

    #[test]
    fn test_launch_config() {
        let config = LaunchConfig::blocks(30, 384);
        assert_eq!(config.grid, GridDim::linear(30));
        assert_eq!(config.block.total_threads(), 384);
        assert_eq!(config.total_threads(), 30 * 384);
        assert_eq!(config.to_string(), "grid=(30, 1, 1), block=(384, 1, 1)");

        // 2^24 blocks of 1024 threads is past u32
        let huge = LaunchConfig::blocks(1 << 24, 1024);
        assert_eq!(huge.total_threads(), 1u64 << 34);
    }
}
