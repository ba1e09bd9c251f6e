//! Device tensor buffer.
//!
//! - [`buffer`]: `Tensor`, the allocate/free/copy lifecycle and its errors
//! - [`shape`]: Validated 2-D shape
//! - [`transfer`]: Host ↔ device transfer accounting

pub mod buffer;
pub mod shape;
pub mod transfer;

pub use buffer::{PreconditionViolation, Tensor, TensorError};
pub use shape::Shape2;
