//! # mdstream-core - Dual-Resident Streams for GPU Molecular Dynamics
//!
//! Host setup code and device kernels of an MD engine share per-atom data
//! through streams: linear arrays mirrored in host and device memory and
//! partitioned into fixed-stride sub-streams, so that several parallel
//! attribute arrays (force output buffers, for instance) are addressed the
//! same way.
//!
//! ## Architecture
//!
//! ```text
//! Device ──────────────► Backend (mdstream-backends: CPU reference, CUDA)
//!   │                        ▲
//!   └─► ResidentStream<T> ───┘  host Vec<T> + device buffer + view table
//!          │
//!          ├─ upload / download      one contiguous transfer each way
//!          ├─ collapse               round-robin sub-stream reshape
//!          └─ device_ref ──────────► SimulationLayout (launch sizing,
//!                                    constants, DeviceRef tables)
//! ```
//!
//! ## Lifecycle
//!
//! 1. Construct streams through a [`Device`]; host and device storage are
//!    allocated together, or not at all.
//! 2. Fill host data and [`ResidentStream::upload`].
//! 3. Build a [`layout::SimulationLayout`] from the streams' device
//!    references and hand it to the kernel layer.
//! 4. [`ResidentStream::download`] results; check them with
//!    [`compare_streams`].
//!
//! ## Example
//!
//! ```rust
//! use mdstream_core::Device;
//!
//! # fn main() -> mdstream_core::Result<()> {
//! let device = Device::cpu();
//! let mut force = device.stream::<f32>(20, 2, "force")?;
//! force.write_sub_stream(0, &(0..20).map(|i| i as f32).collect::<Vec<_>>())?;
//! force.write_sub_stream(1, &(100..120).map(|i| i as f32).collect::<Vec<_>>())?;
//!
//! force.collapse(1, 1)?;
//! assert_eq!(force.stride(), 64);
//! assert_eq!(&force.sub_stream(0)[..4], &[0.0, 100.0, 1.0, 101.0]);
//!
//! mdstream_core::upload_all(&mut [&mut force])?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Every fallible operation returns [`Result`]. [`Error::kind`] groups
//! failures into allocation, transfer and shape-mismatch categories.

pub mod compare;
pub mod config;
pub mod device;
pub mod error;
pub mod layout;
pub mod resident;
pub mod stream;

pub use compare::{compare_streams, StreamComparison};
pub use config::DeviceConfig;
pub use device::{Device, SharedBackend};
pub use error::{Error, ErrorKind, Result};
pub use resident::{deallocate_all, download_all, upload_all, DeviceResident};
pub use stream::{ResidentStream, ShapeError, StreamShape, StreamView};

pub use mdstream_backends::{BackendType, BufferHandle, TransferDirection};
