//! Backend trait and types for device memory management

mod traits;
mod types;

pub use traits::Backend;
pub use types::{BackendType, BlockDim, BufferHandle, GridDim, LaunchConfig, TransferDirection};
