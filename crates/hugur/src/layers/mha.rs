//! Single-position multi-head attention over the key/value caches.

use crate::device::Device;
use crate::dtype::DType;
use crate::error::{HugurError, Result};
use crate::kernels::{get_mha_kernel, MhaArgs};
use crate::layers::{Layer, LayerBase};

/// Inputs: `0` query, `1` score scratch ([head_num, seq_len]), `2` key
/// cache, `3` value cache. Output `0` receives the attended values.
///
/// The caches hold `seq_len * kv_dim` elements per transformer layer;
/// `layer_index` selects the slice and `set_pos` advances the attended
/// range each decode step.
pub struct MhaLayer {
    base: LayerBase,
    layer_index: usize,
    pos: usize,
    head_num: usize,
    seq_len: usize,
    kv_dim: usize,
    kv_mul: usize,
    head_size: usize,
}

impl MhaLayer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: Device,
        layer_index: usize,
        head_num: usize,
        seq_len: usize,
        kv_dim: usize,
        kv_mul: usize,
        head_size: usize,
    ) -> Self {
        Self {
            base: LayerBase::new("mha", device, 4, 1),
            layer_index,
            pos: 0,
            head_num,
            seq_len,
            kv_dim,
            kv_mul,
            head_size,
        }
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn set_layer_index(&mut self, layer_index: usize) {
        self.layer_index = layer_index;
    }
}

impl Layer for MhaLayer {
    fn base(&self) -> &LayerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut LayerBase {
        &mut self.base
    }

    fn check(&self) -> Result<()> {
        let dim = self.head_num * self.head_size;
        let query = self.base.expect_input(0, DType::F32)?;
        let score = self.base.expect_input(1, DType::F32)?;
        let key_cache = self.base.expect_input(2, DType::F32)?;
        let value_cache = self.base.expect_input(3, DType::F32)?;
        let out = self.base.expect_output(0, DType::F32)?;
        self.base.expect_numel(query, dim, "query")?;
        self.base
            .expect_numel(score, self.head_num * self.seq_len, "score scratch")?;
        self.base.expect_numel(out, dim, "output")?;
        if self.pos >= self.seq_len {
            return Err(HugurError::InvalidArgument(format!(
                "mha position {} is outside the sequence window of {}",
                self.pos, self.seq_len
            )));
        }
        let cache_needed = (self.layer_index + 1) * self.seq_len * self.kv_dim;
        for (cache, what) in [(key_cache, "key cache"), (value_cache, "value cache")] {
            if cache.numel() < cache_needed {
                return Err(HugurError::InvalidArgument(format!(
                    "mha {what} holds {} elements, layer {} needs {cache_needed}",
                    cache.numel(),
                    self.layer_index
                )));
            }
        }
        Ok(())
    }

    fn forward(&self) -> Result<()> {
        self.check()?;
        let kernel = get_mha_kernel(self.device());
        kernel(&MhaArgs {
            pos: self.pos,
            head_num: self.head_num,
            layer_index: self.layer_index,
            seq_len: self.seq_len,
            kv_dim: self.kv_dim,
            kv_mul: self.kv_mul,
            head_size: self.head_size,
            query: self.input(0)?,
            score: self.input(1)?,
            key_cache: self.input(2)?,
            value_cache: self.input(3)?,
            output: self.output(0)?,
        })
    }
}
