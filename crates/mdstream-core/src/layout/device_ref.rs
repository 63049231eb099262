//! Non-owning references to stream device storage

use mdstream_backends::BufferHandle;
use std::fmt;
use std::marker::PhantomData;

/// Typed, non-owning reference to a range of device storage
///
/// Carries the raw device address the kernel layer consumes plus the
/// backend handle it came from. Holding one does not keep the storage
/// alive: the stream it was taken from must outlive every use.
pub struct DeviceRef<T> {
    handle: BufferHandle,
    address: u64,
    len: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DeviceRef<T> {
    pub(crate) fn new(handle: BufferHandle, address: u64, len: usize) -> Self {
        Self {
            handle,
            address,
            len,
            _marker: PhantomData,
        }
    }

    /// Backend handle of the underlying allocation
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Device address of the first element
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Number of `T` elements covered
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes covered
    pub fn byte_len(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    /// Sub-range of `len` elements starting `offset` elements in
    ///
    /// The range is clamped to this reference.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        let offset = offset.min(self.len);
        let len = len.min(self.len - offset);
        Self::new(
            self.handle,
            self.address + (offset * std::mem::size_of::<T>()) as u64,
            len,
        )
    }

    /// Whether at least `count` elements are covered
    pub fn covers(&self, count: usize) -> bool {
        self.len >= count
    }
}

impl<T> Clone for DeviceRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DeviceRef<T> {}

impl<T> PartialEq for DeviceRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && self.address == other.address && self.len == other.len
    }
}

impl<T> Eq for DeviceRef<T> {}

impl<T> fmt::Debug for DeviceRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DeviceRef<{}>({} @ {:#x}, len {})",
            std::any::type_name::<T>(),
            self.handle,
            self.address,
            self.len
        )
    }
}
