//! Weight projection: out = scale * (weight @ input).

use crate::device::Device;
use crate::dtype::DType;
use crate::error::{HugurError, Result};
use crate::kernels::{get_matmul_kernel, get_matmul_quant8_kernel};
use crate::layers::{Layer, LayerBase};

/// Matrix-vector projection against a [m, k] weight.
///
/// Inputs: `0` the k-element input, `1` the weight, and for the int8
/// variant `2` the per-group dequantization scales. The quantized path is
/// host-only; its dispatch fails fatally on an accelerator-bound layer.
pub struct MatmulLayer {
    base: LayerBase,
    scale: f32,
    group_size: Option<usize>,
}

impl MatmulLayer {
    pub fn new(device: Device, scale: f32) -> Self {
        Self {
            base: LayerBase::new("matmul", device, 2, 1),
            scale,
            group_size: None,
        }
    }

    /// Int8 groupwise-quantized variant; `group_size` weights share one
    /// f32 scale.
    pub fn new_quant8(device: Device, group_size: usize) -> Self {
        Self {
            base: LayerBase::new("matmul.q8", device, 3, 1),
            scale: 1.0,
            group_size: Some(group_size),
        }
    }
}

impl Layer for MatmulLayer {
    fn base(&self) -> &LayerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut LayerBase {
        &mut self.base
    }

    fn check(&self) -> Result<()> {
        let input = self.base.expect_input(0, DType::F32)?;
        let weight_dtype = if self.group_size.is_some() {
            DType::I8
        } else {
            DType::F32
        };
        let weight = self.base.expect_input(1, weight_dtype)?;
        let out = self.base.expect_output(0, DType::F32)?;
        let (m, k) = match weight.shape() {
            [m, k] => (*m, *k),
            other => {
                return Err(HugurError::InvalidArgument(format!(
                    "matmul weight has shape {other:?}, expected rank 2"
                )))
            }
        };
        self.base.expect_numel(input, k, "input")?;
        self.base.expect_numel(out, m, "output")?;
        if let Some(group_size) = self.group_size {
            let scales = self.base.expect_input(2, DType::F32)?;
            let groups = weight.numel().div_ceil(group_size);
            self.base.expect_numel(scales, groups, "scales")?;
        }
        Ok(())
    }

    fn forward(&self) -> Result<()> {
        self.check()?;
        match self.group_size {
            None => {
                let kernel = get_matmul_kernel(self.device());
                kernel(self.input(0)?, self.input(1)?, self.output(0)?, self.scale)
            }
            Some(group_size) => {
                let kernel = get_matmul_quant8_kernel(self.device());
                kernel(
                    self.input(0)?,
                    self.input(1)?,
                    self.input(2)?,
                    group_size,
                    self.output(0)?,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::allocator_for;
    use crate::tensor::Tensor;

    #[test]
    fn forward_projects_through_the_weight() {
        let cpu = allocator_for(Device::Cpu);
        let mut layer = MatmulLayer::new(Device::Cpu, 1.0);
        layer
            .set_input(0, Tensor::from_f32(&[2], &[1.0, 2.0], cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_input(
                1,
                Tensor::from_f32(&[3, 2], &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0], cpu.clone()).unwrap(),
            )
            .unwrap();
        layer
            .set_output(0, Tensor::zeros(&[3], DType::F32, cpu).unwrap())
            .unwrap();
        layer.forward().unwrap();
        assert_eq!(
            layer.output(0).unwrap().to_vec_f32().unwrap(),
            vec![1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn input_length_must_match_weight_columns() {
        let cpu = allocator_for(Device::Cpu);
        let mut layer = MatmulLayer::new(Device::Cpu, 1.0);
        layer
            .set_input(0, Tensor::zeros(&[3], DType::F32, cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_input(1, Tensor::zeros(&[3, 2], DType::F32, cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_output(0, Tensor::zeros(&[3], DType::F32, cpu).unwrap())
            .unwrap();
        assert_eq!(layer.check().unwrap_err().code(), 6);
    }

    #[test]
    fn quant_variant_requires_scales() {
        let cpu = allocator_for(Device::Cpu);
        let mut layer = MatmulLayer::new_quant8(Device::Cpu, 2);
        layer
            .set_input(0, Tensor::zeros(&[2], DType::F32, cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_input(1, Tensor::zeros(&[2, 2], DType::I8, cpu.clone()).unwrap())
            .unwrap();
        layer
            .set_output(0, Tensor::zeros(&[2], DType::F32, cpu).unwrap())
            .unwrap();
        // Scales slot unbound.
        assert_eq!(layer.check().unwrap_err().code(), 6);
    }
}
