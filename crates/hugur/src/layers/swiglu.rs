//! SwiGLU feed-forward activation: silu(gate) * up.

use crate::device::Device;
use crate::dtype::DType;
use crate::error::Result;
use crate::kernels::get_swiglu_kernel;
use crate::layers::{Layer, LayerBase};

pub struct SwigluLayer {
    base: LayerBase,
    hidden_dim: usize,
}

impl SwigluLayer {
    pub fn new(device: Device, hidden_dim: usize) -> Self {
        Self {
            base: LayerBase::new("swiglu", device, 2, 1),
            hidden_dim,
        }
    }
}

impl Layer for SwigluLayer {
    fn base(&self) -> &LayerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut LayerBase {
        &mut self.base
    }

    fn check(&self) -> Result<()> {
        let gate = self.base.expect_input(0, DType::F32)?;
        let up = self.base.expect_input(1, DType::F32)?;
        let out = self.base.expect_output(0, DType::F32)?;
        self.base.expect_numel(gate, self.hidden_dim, "gate input")?;
        self.base.expect_numel(up, self.hidden_dim, "up input")?;
        self.base.expect_numel(out, self.hidden_dim, "output")
    }

    fn forward(&self) -> Result<()> {
        self.check()?;
        let kernel = get_swiglu_kernel(self.device());
        kernel(self.input(0)?, self.input(1)?, self.output(0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::allocator_for;
    use crate::tensor::Tensor;
    use approx::assert_relative_eq;

    #[test]
    fn forward_gates_the_up_projection() {
        let cpu = allocator_for(Device::Cpu);
        let mut layer = SwigluLayer::new(Device::Cpu, 2);
        layer
            .set_input(0, Tensor::from_f32(&[2], &[1.0, -1.0], cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_input(1, Tensor::from_f32(&[2], &[2.0, 2.0], cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_output(0, Tensor::zeros(&[2], DType::F32, cpu).unwrap())
            .unwrap();
        layer.forward().unwrap();
        let got = layer.output(0).unwrap().to_vec_f32().unwrap();
        let silu = |x: f32| x / (1.0 + (-x).exp());
        assert_relative_eq!(got[0], 2.0 * silu(1.0), epsilon = 1e-6);
        assert_relative_eq!(got[1], 2.0 * silu(-1.0), epsilon = 1e-6);
    }

    #[test]
    fn wrong_hidden_dim_fails_check() {
        let cpu = allocator_for(Device::Cpu);
        let mut layer = SwigluLayer::new(Device::Cpu, 4);
        layer
            .set_input(0, Tensor::zeros(&[2], DType::F32, cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_input(1, Tensor::zeros(&[4], DType::F32, cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_output(0, Tensor::zeros(&[4], DType::F32, cpu).unwrap())
            .unwrap();
        assert_eq!(layer.check().unwrap_err().code(), 6);
    }
}
