//! Token embedding lookup.

use crate::device::Device;
use crate::dtype::DType;
use crate::error::{HugurError, Result};
use crate::kernels::get_embedding_kernel;
use crate::layers::{Layer, LayerBase};

/// Copies one embedding-table row per token id.
///
/// Inputs: `0` token ids (i32), `1` the [vocab_size, dim] table. Output `0`
/// is [token_count, dim].
pub struct EmbeddingLayer {
    base: LayerBase,
    dim: usize,
    vocab_size: usize,
}

impl EmbeddingLayer {
    pub fn new(device: Device, dim: usize, vocab_size: usize) -> Self {
        Self {
            base: LayerBase::new("embedding", device, 2, 1),
            dim,
            vocab_size,
        }
    }
}

impl Layer for EmbeddingLayer {
    fn base(&self) -> &LayerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut LayerBase {
        &mut self.base
    }

    fn check(&self) -> Result<()> {
        let tokens = self.base.expect_input(0, DType::I32)?;
        let table = self.base.expect_input(1, DType::F32)?;
        let out = self.base.expect_output(0, DType::F32)?;
        if table.shape() != [self.vocab_size, self.dim] {
            return Err(HugurError::InvalidArgument(format!(
                "embedding table has shape {:?}, expected [{}, {}]",
                table.shape(),
                self.vocab_size,
                self.dim
            )));
        }
        self.base
            .expect_numel(out, tokens.numel() * self.dim, "output")
    }

    fn forward(&self) -> Result<()> {
        self.check()?;
        let kernel = get_embedding_kernel(self.device());
        kernel(self.input(0)?, self.input(1)?, self.output(0)?, self.vocab_size)
    }
}
