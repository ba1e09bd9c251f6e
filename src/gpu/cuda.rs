//! CUDA device memory via cudarc.
//!
//! Uses the context's default stream and synchronizes after every copy, so
//! each operation has completed by the time it returns.

use std::fmt;
use std::sync::Arc;

use cudarc::driver::sys::CUresult;
use cudarc::driver::{CudaContext, CudaSlice, CudaStream, DriverError};
use tracing::{debug, info};

use super::{check_copy_len, DeviceError, DeviceMemory, DeviceRegion};

impl From<DriverError> for DeviceError {
    fn from(err: DriverError) -> Self {
        DeviceError::Driver(err.to_string())
    }
}

impl DeviceRegion for CudaSlice<f32> {
    fn len(&self) -> usize {
        CudaSlice::len(self)
    }
}

/// Handle to one CUDA device.
#[derive(Clone)]
pub struct CudaDevice {
    ordinal: usize,
    stream: Arc<CudaStream>,
}

impl CudaDevice {
    /// Open the device with the given ordinal.
    pub fn new(ordinal: usize) -> Result<Self, DeviceError> {
        let count = CudaContext::device_count()?;
        if ordinal >= count.max(0) as usize {
            return Err(DeviceError::DeviceNotAvailable(ordinal));
        }

        let ctx = CudaContext::new(ordinal)?;
        let stream = ctx.default_stream();
        info!(device = ordinal, name = %ctx.name()?, "Opened CUDA device");

        Ok(Self { ordinal, stream })
    }
}

impl fmt::Debug for CudaDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CudaDevice")
            .field("ordinal", &self.ordinal)
            .finish()
    }
}

impl DeviceMemory for CudaDevice {
    type Region = CudaSlice<f32>;

    fn ordinal(&self) -> usize {
        self.ordinal
    }

    fn alloc(&self, len: usize) -> Result<CudaSlice<f32>, DeviceError> {
        // SAFETY: the region is only read after a full-length copy-in or by
        // callers that accept unspecified contents.
        let slice = unsafe { self.stream.alloc::<f32>(len) }.map_err(|err| {
            if err.0 == CUresult::CUDA_ERROR_OUT_OF_MEMORY {
                DeviceError::OutOfMemory {
                    device_id: self.ordinal,
                    requested: len.saturating_mul(std::mem::size_of::<f32>()),
                    available: 0,
                }
            } else {
                DeviceError::from(err)
            }
        })?;

        debug!(device = self.ordinal, len, "Allocated device region");
        Ok(slice)
    }

    fn copy_htod(&self, src: &[f32], dst: &mut CudaSlice<f32>) -> Result<(), DeviceError> {
        check_copy_len(dst.len(), src.len())?;
        self.stream.memcpy_htod(src, dst)?;
        self.stream.synchronize()?;
        debug!(device = self.ordinal, len = src.len(), "H2D transfer");
        Ok(())
    }

    fn copy_dtoh(&self, src: &CudaSlice<f32>, dst: &mut [f32]) -> Result<(), DeviceError> {
        check_copy_len(src.len(), dst.len())?;
        self.stream.memcpy_dtoh(src, dst)?;
        self.stream.synchronize()?;
        debug!(device = self.ordinal, len = dst.len(), "D2H transfer");
        Ok(())
    }
}
