//! Element types carried by tensors.

use std::fmt;

/// Element type of a tensor.
///
/// `F32` is the working precision, `I32` carries token ids and positions,
/// `I8` holds group-quantized weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    F32,
    I8,
    I32,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_of(&self) -> usize {
        match self {
            DType::F32 => 4,
            DType::I8 => 1,
            DType::I32 => 4,
        }
    }

    /// Required buffer size in bytes for `numel` elements.
    pub fn bytes_for(&self, numel: usize) -> usize {
        numel * self.size_of()
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::I8 => write!(f, "i8"),
            DType::I32 => write!(f, "i32"),
        }
    }
}
