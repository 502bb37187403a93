//! Rotary position encoding, applied in place to query and key.

use crate::device::Device;
use crate::dtype::DType;
use crate::error::{HugurError, Result};
use crate::kernels::{get_rope_kernel, RopeArgs};
use crate::layers::{Layer, LayerBase};

/// Inputs: `0` query (dim), `1` key (kv_dim), `2` position (single i32),
/// `3` sin cache, `4` cos cache. No outputs; query and key are rotated
/// where they stand.
pub struct RopeLayer {
    base: LayerBase,
    dim: usize,
    kv_dim: usize,
    head_size: usize,
}

impl RopeLayer {
    pub fn new(device: Device, dim: usize, kv_dim: usize, head_size: usize) -> Self {
        Self {
            base: LayerBase::new("rope", device, 5, 0),
            dim,
            kv_dim,
            head_size,
        }
    }
}

impl Layer for RopeLayer {
    fn base(&self) -> &LayerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut LayerBase {
        &mut self.base
    }

    fn check(&self) -> Result<()> {
        let q = self.base.expect_input(0, DType::F32)?;
        let k = self.base.expect_input(1, DType::F32)?;
        let pos = self.base.expect_input(2, DType::I32)?;
        let sin = self.base.expect_input(3, DType::F32)?;
        let cos = self.base.expect_input(4, DType::F32)?;
        self.base.expect_numel(q, self.dim, "query")?;
        self.base.expect_numel(k, self.kv_dim, "key")?;
        self.base.expect_numel(pos, 1, "position")?;
        if sin.numel() != cos.numel() {
            return Err(HugurError::InvalidArgument(format!(
                "rope caches disagree: sin has {} elements, cos has {}",
                sin.numel(),
                cos.numel()
            )));
        }
        if sin.numel() % self.head_size != 0 {
            return Err(HugurError::InvalidArgument(format!(
                "rope cache of {} elements is not a multiple of head size {}",
                sin.numel(),
                self.head_size
            )));
        }
        // Host-resident positions can be bounds-checked here; accelerator
        // positions are only readable by the shader, which indexes within
        // the cache it is given.
        if pos.device().is_cpu() {
            let max_pos = sin.numel() / self.head_size;
            let p = pos.host_i32()?[0];
            if p < 0 || p as usize >= max_pos {
                return Err(HugurError::InvalidArgument(format!(
                    "rope position {p} is outside the cached range of {max_pos} rows"
                )));
            }
        }
        Ok(())
    }

    fn forward(&self) -> Result<()> {
        self.check()?;
        let kernel = get_rope_kernel(self.device());
        kernel(&RopeArgs {
            dim: self.dim,
            kv_dim: self.kv_dim,
            head_size: self.head_size,
            q: self.input(0)?,
            k: self.input(1)?,
            pos: self.input(2)?,
            sin_cache: self.input(3)?,
            cos_cache: self.input(4)?,
        })
    }
}
