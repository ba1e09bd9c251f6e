//! Device-resident 2-D `f32` tensor with a paired gradient region.
//!
//! A [`Tensor`] is either unallocated (no regions, size 0) or allocated (value
//! and gradient regions of `rows * cols` elements each). Regions are owned
//! handles that release their device memory when dropped, so `free`, reallocation
//! and dropping the tensor can never leak or double-release.

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::config::ReallocPolicy;
use crate::gpu::{DeviceError, DeviceMemory};

use super::shape::Shape2;
use super::transfer::{TransferDirection, TransferStats};

/// A call made while the tensor was in the wrong state or with bad inputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionViolation {
    #[error("Tensor is not allocated")]
    NotAllocated,

    #[error("Length mismatch: tensor holds {expected} elements, host data has {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Invalid shape {rows}x{cols}: dimensions must be positive and fit in memory")]
    InvalidShape { rows: usize, cols: usize },

    #[error("Tensor is already allocated as {rows}x{cols}; free it first")]
    AlreadyAllocated { rows: usize, cols: usize },
}

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("Allocation failed for {rows}x{cols} tensor: {source}")]
    AllocationFailure {
        rows: usize,
        cols: usize,
        #[source]
        source: DeviceError,
    },

    #[error(transparent)]
    Precondition(#[from] PreconditionViolation),

    #[error("Device transfer failed: {0}")]
    Transfer(#[source] DeviceError),
}

impl TensorError {
    /// Whether the error came from a violated precondition rather than the device.
    pub fn is_precondition_violation(&self) -> bool {
        matches!(self, TensorError::Precondition(_))
    }
}

/// Value and gradient regions of an allocated tensor.
struct Storage<R> {
    data: R,
    grad: R,
    shape: Shape2,
}

/// A 2-D `f32` buffer in device memory plus an equally sized gradient buffer.
///
/// Not internally synchronized: mutation takes `&mut self`, so sharing across
/// threads requires an external lock.
pub struct Tensor<D: DeviceMemory> {
    /// Device the regions live on.
    device: D,

    /// `None` while unallocated.
    storage: Option<Storage<D::Region>>,

    /// Behaviour of `allocate` on an allocated tensor.
    policy: ReallocPolicy,

    /// Transfer statistics.
    stats: TransferStats,
}

impl<D: DeviceMemory> fmt::Debug for Tensor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("device", &self.device.ordinal())
            .field("shape", &self.shape())
            .field("policy", &self.policy)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<D: DeviceMemory> Tensor<D> {
    /// Create an unallocated tensor on `device`.
    pub fn new(device: D) -> Self {
        Self::with_policy(device, ReallocPolicy::default())
    }

    pub fn with_policy(device: D, policy: ReallocPolicy) -> Self {
        Self {
            device,
            storage: None,
            policy,
            stats: TransferStats::default(),
        }
    }

    /// Reserve value and gradient regions of `rows * cols` elements each.
    ///
    /// Region contents are unspecified until written. On an already allocated
    /// tensor the [`ReallocPolicy`] decides between releasing first and
    /// failing with [`PreconditionViolation::AlreadyAllocated`].
    pub fn allocate(&mut self, rows: usize, cols: usize) -> Result<(), TensorError> {
        let shape = Shape2::new(rows, cols)?;

        if let Some(current) = self.shape() {
            match self.policy {
                ReallocPolicy::Reject => {
                    return Err(PreconditionViolation::AlreadyAllocated {
                        rows: current.rows(),
                        cols: current.cols(),
                    }
                    .into());
                }
                ReallocPolicy::Release => {
                    debug!(
                        device = self.device.ordinal(),
                        from = %current,
                        to = %shape,
                        "Releasing tensor before reallocation"
                    );
                    self.free();
                }
            }
        }

        let alloc_failure = |source| TensorError::AllocationFailure { rows, cols, source };
        let data = self.device.alloc(shape.numel()).map_err(alloc_failure)?;
        // A failed gradient allocation drops `data`, leaving the tensor unallocated.
        let grad = self.device.alloc(shape.numel()).map_err(alloc_failure)?;

        debug!(
            device = self.device.ordinal(),
            shape = %shape,
            bytes = 2 * shape.bytes(),
            "Allocated tensor"
        );
        self.storage = Some(Storage { data, grad, shape });
        Ok(())
    }

    /// Release both regions. No-op when unallocated.
    pub fn free(&mut self) {
        if let Some(storage) = self.storage.take() {
            debug!(
                device = self.device.ordinal(),
                shape = %storage.shape,
                "Freed tensor"
            );
        }
    }

    /// Copy `src` into the value region. The gradient region is untouched.
    ///
    /// `src.len()` must equal [`size`](Self::size); only the element count is
    /// checked, not the shape it was produced for.
    pub fn to_gpu(&mut self, src: &[f32]) -> Result<(), TensorError> {
        let storage = self
            .storage
            .as_mut()
            .ok_or(PreconditionViolation::NotAllocated)?;

        let expected = storage.shape.numel();
        if src.len() != expected {
            return Err(PreconditionViolation::LengthMismatch {
                expected,
                actual: src.len(),
            }
            .into());
        }

        self.device
            .copy_htod(src, &mut storage.data)
            .map_err(TensorError::Transfer)?;
        self.stats
            .record(TransferDirection::HostToDevice, storage.shape.bytes());
        Ok(())
    }

    /// Copy the value region into a new host vector of [`size`](Self::size) elements.
    pub fn to_cpu(&mut self) -> Result<Vec<f32>, TensorError> {
        let storage = self
            .storage
            .as_ref()
            .ok_or(PreconditionViolation::NotAllocated)?;

        let mut out = vec![0.0f32; storage.shape.numel()];
        self.device
            .copy_dtoh(&storage.data, &mut out)
            .map_err(TensorError::Transfer)?;
        self.stats
            .record(TransferDirection::DeviceToHost, storage.shape.bytes());
        Ok(out)
    }

    /// Total number of elements (0 when unallocated).
    pub fn size(&self) -> usize {
        self.shape().map_or(0, |s| s.numel())
    }

    /// Number of rows (0 when unallocated).
    pub fn rows(&self) -> usize {
        self.shape().map_or(0, |s| s.rows())
    }

    /// Number of columns (0 when unallocated).
    pub fn cols(&self) -> usize {
        self.shape().map_or(0, |s| s.cols())
    }

    pub fn shape(&self) -> Option<Shape2> {
        self.storage.as_ref().map(|s| s.shape)
    }

    pub fn is_allocated(&self) -> bool {
        self.storage.is_some()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn policy(&self) -> ReallocPolicy {
        self.policy
    }

    pub fn transfer_stats(&self) -> &TransferStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::allocator::HostDevice;
    use crate::gpu::DeviceRegion;

    #[test]
    fn test_new_is_unallocated() {
        let tensor = Tensor::new(HostDevice::unlimited(0));
        assert!(!tensor.is_allocated());
        assert_eq!(tensor.size(), 0);
        assert_eq!((tensor.rows(), tensor.cols()), (0, 0));
        assert_eq!(tensor.shape(), None);
    }

    #[test]
    fn test_allocate_sets_shape() {
        let dev = HostDevice::unlimited(0);
        let mut tensor = Tensor::new(dev.clone());

        tensor.allocate(4, 5).unwrap();
        assert_eq!(tensor.size(), 20);
        assert_eq!(tensor.rows(), 4);
        assert_eq!(tensor.cols(), 5);

        // Value and gradient regions.
        let stats = dev.stats();
        assert_eq!(stats.live_regions, 2);
        assert_eq!(stats.bytes_in_use, 2 * 20 * 4);
    }

    #[test]
    fn test_regions_match_size() {
        let mut tensor = Tensor::new(HostDevice::unlimited(0));
        tensor.allocate(3, 7).unwrap();

        let storage = tensor.storage.as_ref().unwrap();
        assert_eq!(storage.data.len(), 21);
        assert_eq!(storage.grad.len(), 21);
    }

    #[test]
    fn test_to_gpu_leaves_grad_untouched() {
        let dev = HostDevice::unlimited(0);
        let mut tensor = Tensor::new(dev.clone());
        tensor.allocate(1, 3).unwrap();

        let storage = tensor.storage.as_mut().unwrap();
        dev.copy_htod(&[9.0, 9.0, 9.0], &mut storage.grad).unwrap();

        tensor.to_gpu(&[1.0, 2.0, 3.0]).unwrap();

        let storage = tensor.storage.as_ref().unwrap();
        let mut grad = vec![0.0; 3];
        dev.copy_dtoh(&storage.grad, &mut grad).unwrap();
        assert_eq!(grad, vec![9.0, 9.0, 9.0]);
        assert_eq!(tensor.to_cpu().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_invalid_shape() {
        let dev = HostDevice::unlimited(0);
        let mut tensor = Tensor::new(dev.clone());

        let err = tensor.allocate(0, 3).unwrap_err();
        assert!(err.is_precondition_violation());
        assert!(!tensor.is_allocated());
        assert_eq!(dev.stats().total_allocations, 0);
    }

    #[test]
    fn test_transfer_stats() {
        let mut tensor = Tensor::new(HostDevice::unlimited(0));
        tensor.allocate(2, 2).unwrap();

        tensor.to_gpu(&[0.0; 4]).unwrap();
        tensor.to_cpu().unwrap();
        tensor.to_cpu().unwrap();

        let stats = tensor.transfer_stats();
        assert_eq!(stats.total_h2d_transfers, 1);
        assert_eq!(stats.total_h2d_bytes, 16);
        assert_eq!(stats.total_d2h_transfers, 2);
        assert_eq!(stats.total_d2h_bytes, 32);
    }

    #[test]
    fn test_failed_copy_is_not_counted() {
        let mut tensor = Tensor::new(HostDevice::unlimited(0));
        tensor.allocate(2, 2).unwrap();

        assert!(tensor.to_gpu(&[0.0; 3]).is_err());
        assert_eq!(tensor.transfer_stats().total_h2d_transfers, 0);
    }
}
