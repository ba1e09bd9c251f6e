//! Device memory backends.
//!
//! - [`allocator`]: Simulated device whose memory lives in host RAM, with byte accounting
//! - [`device`]: Device discovery and info
//! - `cuda`: CUDA device memory via cudarc (requires the `cuda` feature)

pub mod allocator;
#[cfg(feature = "cuda")]
pub mod cuda;
pub mod device;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Out of device memory on device {device_id}: requested {requested} bytes, {available} available")]
    OutOfMemory {
        device_id: usize,
        requested: usize,
        available: usize,
    },

    #[error("Copy length mismatch: device region holds {region} elements, host slice holds {host}")]
    LengthMismatch { region: usize, host: usize },

    #[error("CUDA error: {0}")]
    Driver(String),

    #[error("GPU device {0} not available")]
    DeviceNotAvailable(usize),
}

/// An owned region of device memory holding `f32` elements.
///
/// Dropping the region releases the device memory.
pub trait DeviceRegion {
    /// Number of `f32` elements the region holds.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Allocator and copier for a single device.
///
/// All operations block until the device work has completed.
pub trait DeviceMemory {
    type Region: DeviceRegion;

    /// Device index.
    fn ordinal(&self) -> usize;

    /// Reserve a region of `len` elements. Contents are unspecified.
    fn alloc(&self, len: usize) -> Result<Self::Region, DeviceError>;

    /// Copy `src` into `dst`. Lengths must match exactly.
    fn copy_htod(&self, src: &[f32], dst: &mut Self::Region) -> Result<(), DeviceError>;

    /// Copy `src` into `dst`. Lengths must match exactly.
    fn copy_dtoh(&self, src: &Self::Region, dst: &mut [f32]) -> Result<(), DeviceError>;
}

pub(crate) fn check_copy_len(region: usize, host: usize) -> Result<(), DeviceError> {
    if region != host {
        return Err(DeviceError::LengthMismatch { region, host });
    }
    Ok(())
}
