//! Element-wise residual addition.

use crate::device::Device;
use crate::dtype::DType;
use crate::error::Result;
use crate::kernels::get_add_kernel;
use crate::layers::{Layer, LayerBase};

pub struct VecAddLayer {
    base: LayerBase,
}

impl VecAddLayer {
    pub fn new(device: Device) -> Self {
        Self {
            base: LayerBase::new("add", device, 2, 1),
        }
    }
}

impl Layer for VecAddLayer {
    fn base(&self) -> &LayerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut LayerBase {
        &mut self.base
    }

    fn check(&self) -> Result<()> {
        let in1 = self.base.expect_input(0, DType::F32)?;
        let in2 = self.base.expect_input(1, DType::F32)?;
        let out = self.base.expect_output(0, DType::F32)?;
        self.base.expect_numel(in2, in1.numel(), "second input")?;
        self.base.expect_numel(out, in1.numel(), "output")
    }

    fn forward(&self) -> Result<()> {
        self.check()?;
        let kernel = get_add_kernel(self.device());
        kernel(self.input(0)?, self.input(1)?, self.output(0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::allocator_for;
    use crate::tensor::Tensor;

    #[test]
    fn forward_adds_bound_inputs() {
        let cpu = allocator_for(Device::Cpu);
        let mut layer = VecAddLayer::new(Device::Cpu);
        layer
            .set_input(0, Tensor::from_f32(&[3], &[1.0, 2.0, 3.0], cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_input(1, Tensor::from_f32(&[3], &[0.5, 0.5, 0.5], cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_output(0, Tensor::zeros(&[3], DType::F32, cpu).unwrap())
            .unwrap();
        layer.forward().unwrap();
        assert_eq!(layer.output(0).unwrap().to_vec_f32().unwrap(), vec![1.5, 2.5, 3.5]);
    }

    #[test]
    fn mismatched_lengths_fail_check() {
        let cpu = allocator_for(Device::Cpu);
        let mut layer = VecAddLayer::new(Device::Cpu);
        layer
            .set_input(0, Tensor::zeros(&[3], DType::F32, cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_input(1, Tensor::zeros(&[4], DType::F32, cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_output(0, Tensor::zeros(&[3], DType::F32, cpu).unwrap())
            .unwrap();
        let err = layer.forward().unwrap_err();
        assert_eq!(err.code(), 6);
    }

    #[test]
    fn missing_binding_fails_check() {
        let layer = VecAddLayer::new(Device::Cpu);
        let err = layer.check().unwrap_err();
        assert_eq!(err.code(), 6);
    }
}
