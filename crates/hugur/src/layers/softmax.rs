//! In-place softmax, host only.

use crate::device::Device;
use crate::dtype::DType;
use crate::error::Result;
use crate::kernels::get_softmax_kernel;
use crate::layers::{Layer, LayerBase};

/// Normalizes input `0` in place. Only the host kernel exists; attention on
/// the accelerator fuses its softmax into the attention pass instead.
pub struct SoftmaxLayer {
    base: LayerBase,
}

impl SoftmaxLayer {
    pub fn new(device: Device) -> Self {
        Self {
            base: LayerBase::new("softmax", device, 1, 0),
        }
    }
}

impl Layer for SoftmaxLayer {
    fn base(&self) -> &LayerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut LayerBase {
        &mut self.base
    }

    fn check(&self) -> Result<()> {
        self.base.expect_input(0, DType::F32)?;
        Ok(())
    }

    fn forward(&self) -> Result<()> {
        self.check()?;
        let kernel = get_softmax_kernel(self.device());
        kernel(self.input(0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::allocator_for;
    use crate::tensor::Tensor;
    use approx::assert_relative_eq;

    #[test]
    fn forward_normalizes_in_place() {
        let cpu = allocator_for(Device::Cpu);
        let mut layer = SoftmaxLayer::new(Device::Cpu);
        let t = Tensor::from_f32(&[2], &[0.0, 0.0], cpu).unwrap();
        layer.set_input(0, t.clone()).unwrap();
        layer.forward().unwrap();
        let got = t.to_vec_f32().unwrap();
        assert_relative_eq!(got[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(got[1], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn missing_input_fails_check() {
        let layer = SoftmaxLayer::new(Device::Cpu);
        assert_eq!(layer.check().unwrap_err().code(), 6);
    }
}
