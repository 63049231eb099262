//! Residency lifecycle shared by everything that lives in both memory spaces

use crate::error::Result;
use crate::stream::ResidentStream;
use bytemuck::Pod;

/// An object with host and device storage that can be moved between them
///
/// Object safe, so a simulation can keep its streams of different element
/// types in one list and move them all at once with [`upload_all`] and
/// [`download_all`].
pub trait DeviceResident {
    /// Diagnostic label
    fn label(&self) -> &str;

    /// Acquire host and device storage (no-op when already resident)
    fn allocate(&mut self) -> Result<()>;

    /// Release host and device storage
    fn deallocate(&mut self) -> Result<()>;

    /// Copy host storage to device storage
    fn upload(&mut self) -> Result<()>;

    /// Copy device storage to host storage
    fn download(&mut self) -> Result<()>;
}

impl<T: Pod> DeviceResident for ResidentStream<T> {
    fn label(&self) -> &str {
        self.name()
    }

    fn allocate(&mut self) -> Result<()> {
        ResidentStream::allocate(self)
    }

    fn deallocate(&mut self) -> Result<()> {
        ResidentStream::deallocate(self)
    }

    fn upload(&mut self) -> Result<()> {
        ResidentStream::upload(self)
    }

    fn download(&mut self) -> Result<()> {
        ResidentStream::download(self)
    }
}

/// Upload every resident in order, stopping at the first failure
#[tracing::instrument(skip_all, fields(count = residents.len()))]
pub fn upload_all(residents: &mut [&mut dyn DeviceResident]) -> Result<()> {
    let perf = mdstream_tracing::perf_span!("upload_all", residents = residents.len());
    let _entered = perf.enter();
    for resident in residents.iter_mut() {
        resident.upload()?;
    }
    Ok(())
}

/// Download every resident in order, stopping at the first failure
#[tracing::instrument(skip_all, fields(count = residents.len()))]
pub fn download_all(residents: &mut [&mut dyn DeviceResident]) -> Result<()> {
    let perf = mdstream_tracing::perf_span!("download_all", residents = residents.len());
    let _entered = perf.enter();
    for resident in residents.iter_mut() {
        resident.download()?;
    }
    Ok(())
}

/// Deallocate every resident, continuing past failures
///
/// Returns the first error encountered.
pub fn deallocate_all(residents: &mut [&mut dyn DeviceResident]) -> Result<()> {
    let mut first_error = None;
    for resident in residents.iter_mut() {
        if let Err(e) = resident.deallocate() {
            tracing::warn!(resident = resident.label(), error = %e, "deallocate failed");
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}
