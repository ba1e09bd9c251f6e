//! Integration tests for the tensor lifecycle on the simulated device.

use gpu_tensor::gpu::allocator::HostDevice;
use gpu_tensor::{PreconditionViolation, Tensor, TensorError};

fn host_tensor() -> (HostDevice, Tensor<HostDevice>) {
    let dev = HostDevice::unlimited(0);
    let tensor = Tensor::new(dev.clone());
    (dev, tensor)
}

#[test]
fn test_allocate_reports_shape() {
    for (rows, cols) in [(1, 1), (2, 3), (7, 1), (1, 9), (64, 33)] {
        let (_dev, mut tensor) = host_tensor();
        tensor.allocate(rows, cols).unwrap();
        assert_eq!(tensor.size(), rows * cols);
        assert_eq!(tensor.rows(), rows);
        assert_eq!(tensor.cols(), cols);
        assert!(tensor.is_allocated());
    }
}

#[test]
fn test_round_trip_preserves_values() {
    let (_dev, mut tensor) = host_tensor();
    tensor.allocate(3, 4).unwrap();

    let values = vec![
        0.0, -0.0, 1.5, -2.25, 1e-30, -1e30, f32::MIN_POSITIVE, f32::MAX, f32::MIN, 1234.5678,
        f32::INFINITY, f32::NEG_INFINITY,
    ];
    tensor.to_gpu(&values).unwrap();

    let out = tensor.to_cpu().unwrap();
    assert_eq!(out.len(), values.len());
    for (a, b) in values.iter().zip(&out) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn test_nan_survives_round_trip() {
    let (_dev, mut tensor) = host_tensor();
    tensor.allocate(1, 2).unwrap();

    tensor.to_gpu(&[f32::NAN, 1.0]).unwrap();
    let out = tensor.to_cpu().unwrap();
    assert!(out[0].is_nan());
    assert_eq!(out[1], 1.0);
}

#[test]
fn test_to_gpu_overwrites_previous_contents() {
    let (_dev, mut tensor) = host_tensor();
    tensor.allocate(2, 2).unwrap();

    tensor.to_gpu(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    tensor.to_gpu(&[5.0, 6.0, 7.0, 8.0]).unwrap();
    assert_eq!(tensor.to_cpu().unwrap(), vec![5.0, 6.0, 7.0, 8.0]);
}

#[test]
fn test_free_is_idempotent() {
    let (dev, mut tensor) = host_tensor();
    tensor.allocate(2, 2).unwrap();

    tensor.free();
    assert!(!tensor.is_allocated());
    assert_eq!(tensor.size(), 0);

    tensor.free();
    assert!(!tensor.is_allocated());
    assert_eq!(tensor.size(), 0);
    assert_eq!((tensor.rows(), tensor.cols()), (0, 0));

    let stats = dev.stats();
    assert_eq!(stats.live_regions, 0);
    assert_eq!(stats.total_frees, 2);
}

#[test]
fn test_free_on_new_tensor() {
    let (dev, mut tensor) = host_tensor();
    tensor.free();
    assert!(!tensor.is_allocated());
    assert_eq!(dev.stats().total_frees, 0);
}

#[test]
fn test_copies_require_allocation() {
    let (_dev, mut tensor) = host_tensor();

    let err = tensor.to_cpu().unwrap_err();
    assert!(matches!(
        err,
        TensorError::Precondition(PreconditionViolation::NotAllocated)
    ));

    let err = tensor.to_gpu(&[]).unwrap_err();
    assert!(matches!(
        err,
        TensorError::Precondition(PreconditionViolation::NotAllocated)
    ));
}

#[test]
fn test_to_gpu_length_mismatch() {
    let (_dev, mut tensor) = host_tensor();
    tensor.allocate(2, 3).unwrap();

    for len in [0, 5, 7, 12] {
        let err = tensor.to_gpu(&vec![1.0; len]).unwrap_err();
        assert!(err.is_precondition_violation());
        assert!(matches!(
            err,
            TensorError::Precondition(PreconditionViolation::LengthMismatch { expected: 6, actual })
                if actual == len
        ));
    }

    // Still allocated and usable.
    tensor.to_gpu(&[0.0; 6]).unwrap();
}

#[test]
fn test_same_size_different_shape_is_accepted() {
    let (_dev, mut tensor) = host_tensor();
    tensor.allocate(2, 3).unwrap();

    // Data laid out for a 3x2 tensor has the same element count.
    let three_by_two = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    tensor.to_gpu(&three_by_two).unwrap();
    assert_eq!(tensor.to_cpu().unwrap(), three_by_two.to_vec());
}

#[test]
fn test_scenario_allocate_copy_free() {
    let (dev, mut tensor) = host_tensor();

    tensor.allocate(2, 3).unwrap();
    assert_eq!(tensor.size(), 6);

    tensor.to_gpu(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    assert_eq!(tensor.to_cpu().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

    tensor.free();
    assert!(tensor.to_cpu().is_err());
    assert_eq!(dev.stats().live_regions, 0);
}
