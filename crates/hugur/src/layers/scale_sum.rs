//! Weighted accumulation of cached value rows, host only.

use crate::device::Device;
use crate::dtype::DType;
use crate::error::{HugurError, Result};
use crate::kernels::get_scale_sum_kernel;
use crate::layers::{Layer, LayerBase};

/// out[j] += scale[t] * value[t * stride + j] for every attended position
/// t in 0..=pos. Inputs: `0` the value rows, `1` the per-position scales.
/// The caller zeroes the output before the first accumulation.
pub struct ScaleSumLayer {
    base: LayerBase,
    pos: usize,
    size: usize,
    stride: usize,
}

impl ScaleSumLayer {
    pub fn new(device: Device, size: usize, stride: usize) -> Self {
        Self {
            base: LayerBase::new("scale_sum", device, 2, 1),
            pos: 0,
            size,
            stride,
        }
    }

    /// Advances the attended range to 0..=pos.
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }
}

impl Layer for ScaleSumLayer {
    fn base(&self) -> &LayerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut LayerBase {
        &mut self.base
    }

    fn check(&self) -> Result<()> {
        let value = self.base.expect_input(0, DType::F32)?;
        let scale = self.base.expect_input(1, DType::F32)?;
        let out = self.base.expect_output(0, DType::F32)?;
        if value.numel() < self.pos * self.stride + self.size {
            return Err(HugurError::InvalidArgument(format!(
                "scale_sum values hold {} elements, position {} needs {}",
                value.numel(),
                self.pos,
                self.pos * self.stride + self.size
            )));
        }
        if scale.numel() <= self.pos {
            return Err(HugurError::InvalidArgument(format!(
                "scale_sum scales hold {} elements, position {} is out of range",
                scale.numel(),
                self.pos
            )));
        }
        self.base.expect_numel(out, self.size, "output")
    }

    fn forward(&self) -> Result<()> {
        self.check()?;
        let kernel = get_scale_sum_kernel(self.device());
        kernel(
            self.input(0)?,
            self.input(1)?,
            self.output(0)?,
            self.pos,
            self.size,
            self.stride,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::allocator_for;
    use crate::tensor::Tensor;

    #[test]
    fn forward_accumulates_the_attended_rows() {
        let cpu = allocator_for(Device::Cpu);
        let mut layer = ScaleSumLayer::new(Device::Cpu, 2, 2);
        layer.set_pos(1);
        layer
            .set_input(0, Tensor::from_f32(&[3, 2], &[1.0, 2.0, 3.0, 4.0, 9.0, 9.0], cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_input(1, Tensor::from_f32(&[3], &[2.0, 1.0, 9.0], cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_output(0, Tensor::zeros(&[2], DType::F32, cpu).unwrap())
            .unwrap();
        layer.forward().unwrap();
        // 2*[1,2] + 1*[3,4]; row 2 and its scale are past pos.
        assert_eq!(layer.output(0).unwrap().to_vec_f32().unwrap(), vec![5.0, 8.0]);
    }

    #[test]
    fn pos_past_the_cached_rows_fails_check() {
        let cpu = allocator_for(Device::Cpu);
        let mut layer = ScaleSumLayer::new(Device::Cpu, 2, 2);
        layer.set_pos(5);
        layer
            .set_input(0, Tensor::zeros(&[3, 2], DType::F32, cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_input(1, Tensor::zeros(&[3], DType::F32, cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_output(0, Tensor::zeros(&[2], DType::F32, cpu).unwrap())
            .unwrap();
        assert_eq!(layer.check().unwrap_err().code(), 6);
    }
}
