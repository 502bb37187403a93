//! Root-mean-square normalization with a learned gain.

use crate::device::Device;
use crate::dtype::DType;
use crate::error::Result;
use crate::kernels::get_rmsnorm_kernel;
use crate::layers::{Layer, LayerBase};

pub struct RmsNormLayer {
    base: LayerBase,
    dim: usize,
    eps: f32,
}

impl RmsNormLayer {
    pub fn new(device: Device, dim: usize, eps: f32) -> Self {
        Self {
            base: LayerBase::new("rmsnorm", device, 2, 1),
            dim,
            eps,
        }
    }
}

impl Layer for RmsNormLayer {
    fn base(&self) -> &LayerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut LayerBase {
        &mut self.base
    }

    fn check(&self) -> Result<()> {
        let input = self.base.expect_input(0, DType::F32)?;
        let weight = self.base.expect_input(1, DType::F32)?;
        let out = self.base.expect_output(0, DType::F32)?;
        self.base.expect_numel(input, self.dim, "input")?;
        self.base.expect_numel(weight, self.dim, "weight")?;
        self.base.expect_numel(out, self.dim, "output")
    }

    fn forward(&self) -> Result<()> {
        self.check()?;
        let kernel = get_rmsnorm_kernel(self.device());
        kernel(self.input(0)?, self.input(1)?, self.output(0)?, self.eps)
    }
}
