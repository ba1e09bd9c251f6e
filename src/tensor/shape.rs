//! Validated 2-D tensor shape.

use serde::Serialize;

use super::buffer::PreconditionViolation;

/// A `(rows, cols)` pair with both dimensions positive and an element and
/// byte count that fit in `usize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Shape2 {
    rows: usize,
    cols: usize,
}

impl Shape2 {
    pub fn new(rows: usize, cols: usize) -> Result<Self, PreconditionViolation> {
        let invalid = PreconditionViolation::InvalidShape { rows, cols };
        if rows == 0 || cols == 0 {
            return Err(invalid);
        }
        rows.checked_mul(cols)
            .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()))
            .ok_or(invalid)?;
        Ok(Self { rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Element count.
    pub fn numel(&self) -> usize {
        self.rows * self.cols
    }

    /// Byte size of one `f32` region of this shape.
    pub fn bytes(&self) -> usize {
        self.numel() * std::mem::size_of::<f32>()
    }
}

impl std::fmt::Display for Shape2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}
