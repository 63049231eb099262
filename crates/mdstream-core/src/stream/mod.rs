//! Dual-resident sub-stream buffers
//!
//! A [`ResidentStream<T>`] keeps one flat array of `stride * sub_streams`
//! elements in host memory and an identically sized allocation in device
//! memory. The two copies are independent: nothing moves between them until
//! [`ResidentStream::upload`] or [`ResidentStream::download`] is called.
//!
//! ```text
//! host   [ s0: 0 .. length | pad ][ s1: 0 .. length | pad ] ...
//!          ^ offset 0               ^ offset stride
//! device [ same layout, separate allocation                ] ...
//! ```
//!
//! # Example
//!
//! ```rust
//! use mdstream_core::Device;
//!
//! # fn main() -> mdstream_core::Result<()> {
//! let device = Device::cpu();
//! let mut posq = device.stream::<f32>(20, 2, "posq")?;
//! assert_eq!(posq.stride(), 32);
//!
//! posq.sub_stream_mut(1)[0] = 1.5;
//! posq.upload()?;
//! posq[32] = 0.0;
//! posq.download()?;
//! assert_eq!(posq[32], 1.5);
//! # Ok(())
//! # }
//! ```

mod collapse;
mod shape;

pub use shape::{aligned_stride, ShapeError, StreamShape, StreamView, STRIDE_ALIGNMENT};

use crate::device::{Device, SharedBackend};
use crate::error::{Error, Result};
use crate::layout::DeviceRef;
use bytemuck::Pod;
use mdstream_backends::{BufferHandle, TransferDirection};
use mdstream_tracing::performance::{record_allocation, record_reshape, record_transfer};
use std::collections::TryReserveError;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::time::Instant;

/// Zeroed host storage, reporting allocator failure instead of aborting
fn zeroed_host<T: Pod>(elements: usize) -> std::result::Result<Vec<T>, TryReserveError> {
    let mut storage = Vec::new();
    storage.try_reserve_exact(elements)?;
    storage.resize(elements, T::zeroed());
    Ok(storage)
}

/// Mirrored host/device array partitioned into fixed-stride sub-streams
///
/// The stream owns both storages. Dropping it frees the device allocation;
/// there is no other way to release it.
pub struct ResidentStream<T> {
    name: String,
    shape: StreamShape,
    host: Vec<T>,
    views: Vec<StreamView>,
    device: Option<BufferHandle>,
    device_stale: bool,
    backend: SharedBackend,
}

impl<T: Pod> ResidentStream<T> {
    /// Allocate host and device storage for `sub_streams` sub-streams of
    /// `length` elements
    ///
    /// Both storages start zeroed. If the device allocation fails the host
    /// storage is released before the error is returned.
    #[tracing::instrument(skip(device, name), fields(
        stream = %name.as_ref(),
        elem_size = std::mem::size_of::<T>(),
    ))]
    pub fn new(device: &Device, length: usize, sub_streams: usize, name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref().to_string();
        let shape = StreamShape::new(length, sub_streams).map_err(|source| Error::shape(&name, source))?;

        let mut stream = Self {
            name,
            shape,
            host: Vec::new(),
            views: shape.views(),
            device: None,
            device_stale: false,
            backend: device.backend(),
        };
        stream.allocate()?;
        Ok(stream)
    }

    /// Diagnostic label
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current geometry
    pub fn shape(&self) -> StreamShape {
        self.shape
    }

    /// Logical elements per sub-stream
    pub fn length(&self) -> usize {
        self.shape.length
    }

    /// Number of sub-streams
    pub fn sub_streams(&self) -> usize {
        self.shape.sub_streams
    }

    /// Padded capacity per sub-stream
    pub fn stride(&self) -> usize {
        self.shape.stride
    }

    /// Flat host extent currently addressable (0 while deallocated)
    pub fn extent(&self) -> usize {
        if self.is_resident() {
            self.shape.extent()
        } else {
            0
        }
    }

    /// Size of the flat extent in bytes
    pub fn size_bytes(&self) -> usize {
        self.extent() * std::mem::size_of::<T>()
    }

    /// View table, one `(offset, len)` entry per sub-stream
    ///
    /// The same offsets apply to the host and device storage.
    pub fn views(&self) -> &[StreamView] {
        &self.views
    }

    /// Whether host and device storage are currently allocated
    pub fn is_resident(&self) -> bool {
        self.device.is_some()
    }

    /// Whether the host copy was changed since the last transfer
    ///
    /// Set by [`collapse`](Self::collapse) and mutable host access, cleared by
    /// [`upload`](Self::upload) and [`download`](Self::download).
    pub fn is_device_stale(&self) -> bool {
        self.device_stale
    }

    /// Backend handle of the device storage
    pub fn device_handle(&self) -> Option<BufferHandle> {
        self.device
    }

    /// Host storage as one flat slice
    pub fn as_slice(&self) -> &[T] {
        &self.host[..self.extent()]
    }

    /// Mutable host storage as one flat slice
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.device_stale = true;
        let extent = self.extent();
        &mut self.host[..extent]
    }

    /// Checked flat element access
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// Checked mutable flat element access
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    /// Logical elements of sub-stream `index` (padding excluded)
    ///
    /// # Panics
    ///
    /// Panics if `index >= sub_streams()` or the stream is not resident.
    pub fn sub_stream(&self, index: usize) -> &[T] {
        let view = self.sub_stream_view(index);
        &self.host[view.offset..view.offset + self.shape.length]
    }

    /// Mutable logical elements of sub-stream `index`
    ///
    /// # Panics
    ///
    /// Panics if `index >= sub_streams()` or the stream is not resident.
    pub fn sub_stream_mut(&mut self, index: usize) -> &mut [T] {
        let view = self.sub_stream_view(index);
        let length = self.shape.length;
        self.device_stale = true;
        &mut self.host[view.offset..view.offset + length]
    }

    fn sub_stream_view(&self, index: usize) -> StreamView {
        assert!(
            index < self.views.len(),
            "sub-stream {index} out of range for stream '{}' with {} sub-streams",
            self.name,
            self.views.len()
        );
        assert!(self.is_resident(), "stream '{}' is not resident", self.name);
        self.views[index]
    }

    /// Copy `data` to the start of sub-stream `index`
    pub fn write_sub_stream(&mut self, index: usize, data: &[T]) -> Result<()> {
        if !self.is_resident() {
            return Err(Error::not_resident(&self.name));
        }
        let view = self.views.get(index).copied().ok_or_else(|| Error::IndexOutOfBounds {
            stream: self.name.clone(),
            index,
            extent: self.shape.sub_streams,
        })?;
        if data.len() > view.len {
            return Err(Error::IndexOutOfBounds {
                stream: self.name.clone(),
                index: view.offset + data.len() - 1,
                extent: view.offset + view.len,
            });
        }

        self.host[view.offset..view.offset + data.len()].copy_from_slice(data);
        self.device_stale = true;
        Ok(())
    }

    /// Fill every slot of the flat extent, padding included
    pub fn fill(&mut self, value: T) {
        self.as_mut_slice().fill(value);
    }

    /// Copy host storage to device storage in one contiguous transfer
    #[tracing::instrument(skip(self), fields(stream = %self.name, bytes = self.size_bytes()))]
    pub fn upload(&mut self) -> Result<()> {
        let handle = self.device.ok_or_else(|| Error::not_resident(&self.name))?;
        let extent = self.shape.extent();
        let bytes: &[u8] = bytemuck::cast_slice(&self.host[..extent]);
        let byte_len = bytes.len();

        let start = Instant::now();
        self.backend
            .write()
            .copy_to_buffer(handle, bytes)
            .map_err(|source| Error::Transfer {
                stream: self.name.clone(),
                direction: TransferDirection::HostToDevice,
                bytes: byte_len,
                source,
            })?;
        let duration_us = start.elapsed().as_micros() as u64;
        record_transfer(&self.name, TransferDirection::HostToDevice.as_str(), byte_len, duration_us);

        self.device_stale = false;
        Ok(())
    }

    /// Copy device storage back over host storage
    ///
    /// On failure the host copy is left as it was.
    #[tracing::instrument(skip(self), fields(stream = %self.name, bytes = self.size_bytes()))]
    pub fn download(&mut self) -> Result<()> {
        let handle = self.device.ok_or_else(|| Error::not_resident(&self.name))?;
        let extent = self.shape.extent();
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.host[..extent]);
        let byte_len = bytes.len();

        let start = Instant::now();
        self.backend
            .write()
            .copy_from_buffer(handle, bytes)
            .map_err(|source| Error::Transfer {
                stream: self.name.clone(),
                direction: TransferDirection::DeviceToHost,
                bytes: byte_len,
                source,
            })?;
        let duration_us = start.elapsed().as_micros() as u64;
        record_transfer(&self.name, TransferDirection::DeviceToHost.as_str(), byte_len, duration_us);

        self.device_stale = false;
        Ok(())
    }

    /// Redistribute the logical elements over `new_sub_streams` sub-streams
    ///
    /// Elements are read in row-major `(i, j)` order and dealt round-robin to
    /// the new sub-streams in runs of `interleave`. The flat extent is kept,
    /// so the new stride is `stride * sub_streams / new_sub_streams`; it must
    /// divide evenly and stay 16-aligned. Padding slots are zero afterwards.
    ///
    /// Only host storage changes; the device copy is stale until the next
    /// [`upload`](Self::upload). On error the stream is left untouched.
    ///
    /// ```rust
    /// use mdstream_core::Device;
    ///
    /// # fn main() -> mdstream_core::Result<()> {
    /// let device = Device::cpu();
    /// let mut forces = device.stream::<i32>(2, 2, "force")?;
    /// forces.write_sub_stream(0, &[1, 2])?;
    /// forces.write_sub_stream(1, &[10, 20])?;
    ///
    /// forces.collapse(1, 1)?;
    /// assert_eq!(forces.sub_stream(0), &[1, 10, 2, 20]);
    /// assert!(forces.is_device_stale());
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self), fields(stream = %self.name, from = self.shape.sub_streams))]
    pub fn collapse(&mut self, new_sub_streams: usize, interleave: usize) -> Result<()> {
        if !self.is_resident() {
            return Err(Error::not_resident(&self.name));
        }
        let from = self.shape;
        let to = from
            .collapsed(new_sub_streams, interleave)
            .map_err(|source| Error::shape(&self.name, source))?;

        let start = Instant::now();
        let mut scratch = zeroed_host::<T>(to.extent()).map_err(|source| Error::HostAllocation {
            stream: self.name.clone(),
            bytes: to.extent() * std::mem::size_of::<T>(),
            source,
        })?;
        let mut views = Vec::new();
        views.try_reserve_exact(to.sub_streams).map_err(|source| Error::HostAllocation {
            stream: self.name.clone(),
            bytes: to.sub_streams * std::mem::size_of::<StreamView>(),
            source,
        })?;
        views.extend((0..to.sub_streams).map(|i| to.view(i)));

        collapse::interleave_into(&self.host[..from.extent()], &from, &to, interleave, &mut scratch);
        self.host[..to.extent()].copy_from_slice(&scratch);

        self.shape = to;
        self.views = views;
        self.device_stale = true;

        let duration_us = start.elapsed().as_micros() as u64;
        record_reshape(&self.name, from.sub_streams, to.sub_streams, to.logical_elements(), duration_us);
        Ok(())
    }

    /// Non-owning reference to the whole device storage
    pub fn device_ref(&self) -> Result<DeviceRef<T>> {
        let handle = self.device.ok_or_else(|| Error::not_resident(&self.name))?;
        let address = self.backend.read().device_address(handle)?;
        Ok(DeviceRef::new(handle, address, self.shape.extent()))
    }

    /// Non-owning reference to sub-stream `index` of the device storage
    ///
    /// Covers the full stride, padding included.
    pub fn sub_stream_ref(&self, index: usize) -> Result<DeviceRef<T>> {
        let view = self.views.get(index).copied().ok_or_else(|| Error::IndexOutOfBounds {
            stream: self.name.clone(),
            index,
            extent: self.shape.sub_streams,
        })?;
        let whole = self.device_ref()?;
        Ok(whole.slice(view.offset, view.len))
    }

    /// Re-create zeroed host and device storage at the current shape
    ///
    /// Does nothing if the stream is already resident. If the device
    /// allocation fails the stream stays non-resident with no storage held.
    #[tracing::instrument(skip(self), fields(stream = %self.name, shape = %self.shape))]
    pub fn allocate(&mut self) -> Result<()> {
        if self.is_resident() {
            return Ok(());
        }

        let bytes = self
            .shape
            .byte_len::<T>()
            .map_err(|source| Error::shape(&self.name, source))?;
        let start = Instant::now();

        let host = zeroed_host::<T>(self.shape.extent()).map_err(|source| Error::HostAllocation {
            stream: self.name.clone(),
            bytes,
            source,
        })?;

        let handle = self
            .backend
            .write()
            .allocate_buffer(bytes)
            .map_err(|source| {
                tracing::debug!(stream = %self.name, bytes, "device_allocation_failed_releasing_host");
                Error::Allocation {
                    stream: self.name.clone(),
                    bytes,
                    source,
                }
            })?;

        self.host = host;
        self.device = Some(handle);
        self.device_stale = false;

        let duration_us = start.elapsed().as_micros() as u64;
        record_allocation(&self.name, bytes * 2, duration_us);
        Ok(())
    }

    /// Release host and device storage
    ///
    /// The stream keeps its shape and can be re-allocated. Transfers return
    /// [`Error::NotResident`] until then.
    #[tracing::instrument(skip(self), fields(stream = %self.name))]
    pub fn deallocate(&mut self) -> Result<()> {
        self.host = Vec::new();
        self.device_stale = false;
        match self.device.take() {
            Some(handle) => Ok(self.backend.write().free_buffer(handle)?),
            None => Ok(()),
        }
    }
}

impl<T: Pod> Index<usize> for ResidentStream<T> {
    type Output = T;

    /// Flat host access
    ///
    /// # Panics
    ///
    /// Panics if `index >= extent()`. Use [`ResidentStream::get`] for a checked
    /// variant.
    fn index(&self, index: usize) -> &T {
        match self.as_slice().get(index) {
            Some(value) => value,
            None => panic!(
                "index {index} out of bounds for stream '{}' with extent {}",
                self.name,
                self.extent()
            ),
        }
    }
}

impl<T: Pod> IndexMut<usize> for ResidentStream<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        let extent = self.extent();
        if index >= extent {
            panic!("index {index} out of bounds for stream '{}' with extent {extent}", self.name);
        }
        self.device_stale = true;
        &mut self.host[index]
    }
}

impl<T> fmt::Debug for ResidentStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResidentStream")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("device", &self.device)
            .field("device_stale", &self.device_stale)
            .finish()
    }
}

impl<T> Drop for ResidentStream<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.device.take() {
            if let Err(e) = self.backend.write().free_buffer(handle) {
                tracing::warn!(stream = %self.name, error = %e, "failed to free device storage");
            }
        }
    }
}
