//! gpu-tensor: a device-resident 2-D `f32` tensor buffer.
//!
//! A [`Tensor`] owns a value region and an equally sized gradient region in
//! device memory and supports exactly four operations: allocate, free,
//! copy-in (host → device) and copy-out (device → host). Device memory comes
//! from a [`DeviceMemory`] backend: a simulated device in host RAM, or CUDA
//! with the `cuda` feature.

pub mod config;
pub mod gpu;
pub mod probe;
pub mod tensor;

pub use gpu::{DeviceError, DeviceMemory, DeviceRegion};
pub use tensor::{PreconditionViolation, Shape2, Tensor, TensorError};
