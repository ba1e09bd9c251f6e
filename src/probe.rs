//! Round-trip probe: allocate, upload a known pattern, download, compare, free.
//!
//! Used by the binary to check that a backend moves data faithfully.

use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::gpu::DeviceMemory;
use crate::tensor::transfer::TransferStats;
use crate::tensor::{Tensor, TensorError};

/// Outcome of one round trip.
#[derive(Debug, Clone, Serialize)]
pub struct RoundTripReport {
    pub device_id: usize,
    pub rows: usize,
    pub cols: usize,
    pub size: usize,

    /// Bytes in each of the value and gradient regions.
    pub bytes_per_region: usize,

    /// Whether every element came back bit-identical.
    pub matched: bool,

    /// Number of elements that differed.
    pub mismatches: usize,

    /// Transfer counters of the tensor after the round trip.
    pub transfers: TransferStats,

    pub elapsed_us: u64,
}

/// Deterministic upload pattern: `0.0, 0.5, 1.0, ...`.
pub fn pattern(size: usize) -> Vec<f32> {
    (0..size).map(|i| i as f32 * 0.5).collect()
}

/// Run a round trip of a `rows x cols` tensor.
///
/// The tensor is freed before returning, also when a copy fails.
pub fn round_trip<D: DeviceMemory>(
    tensor: &mut Tensor<D>,
    rows: usize,
    cols: usize,
) -> Result<RoundTripReport, TensorError> {
    let start = Instant::now();

    tensor.allocate(rows, cols)?;
    let size = tensor.size();
    let bytes_per_region = tensor.shape().map_or(0, |s| s.bytes());

    let expected = pattern(size);
    let result = tensor.to_gpu(&expected).and_then(|()| tensor.to_cpu());
    tensor.free();
    let actual = result?;

    let mismatches = expected
        .iter()
        .zip(&actual)
        .filter(|(e, a)| e.to_bits() != a.to_bits())
        .count();

    let report = RoundTripReport {
        device_id: tensor.device().ordinal(),
        rows,
        cols,
        size,
        bytes_per_region,
        matched: mismatches == 0,
        mismatches,
        transfers: *tensor.transfer_stats(),
        elapsed_us: start.elapsed().as_micros() as u64,
    };

    if report.matched {
        info!(rows, cols, elapsed_us = report.elapsed_us, "Round trip matched");
    } else {
        warn!(rows, cols, mismatches, "Round trip returned different data");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::allocator::HostDevice;

    #[test]
    fn test_round_trip_host() {
        let dev = HostDevice::unlimited(0);
        let mut tensor = Tensor::new(dev.clone());

        let report = round_trip(&mut tensor, 16, 32).unwrap();
        assert!(report.matched);
        assert_eq!(report.size, 512);
        assert_eq!(report.bytes_per_region, 2048);
        assert_eq!(report.transfers.total_h2d_transfers, 1);
        assert_eq!(report.transfers.total_d2h_transfers, 1);

        assert!(!tensor.is_allocated());
        assert_eq!(dev.stats().live_regions, 0);
    }

    #[test]
    fn test_round_trip_out_of_memory() {
        let dev = HostDevice::new(0, 64);
        let mut tensor = Tensor::new(dev.clone());

        let err = round_trip(&mut tensor, 4, 4).unwrap_err();
        assert!(matches!(err, TensorError::AllocationFailure { .. }));
        assert_eq!(dev.stats().live_regions, 0);
    }

    #[test]
    fn test_pattern() {
        assert_eq!(pattern(4), vec![0.0, 0.5, 1.0, 1.5]);
    }
}
