//! Operator layers: validated, device-bound wrappers over the kernel table.
//!
//! A layer is constructed for one device with its hyperparameters, then has
//! tensors bound into numbered input and output slots. `check` validates the
//! bindings (presence, device placement, dtype, shape) and returns a
//! recoverable error on mismatch; `forward` re-runs `check` and then invokes
//! the kernel the dispatch table selects for the layer's device. Binding a
//! slot is cheap since tensors share their buffers on clone.

pub mod add;
pub mod embedding;
pub mod matmul;
pub mod mha;
pub mod rmsnorm;
pub mod rope;
pub mod scale_sum;
pub mod softmax;
pub mod swiglu;

pub use add::VecAddLayer;
pub use embedding::EmbeddingLayer;
pub use matmul::MatmulLayer;
pub use mha::MhaLayer;
pub use rmsnorm::RmsNormLayer;
pub use rope::RopeLayer;
pub use scale_sum::ScaleSumLayer;
pub use softmax::SoftmaxLayer;
pub use swiglu::SwigluLayer;

use crate::device::Device;
use crate::dtype::DType;
use crate::error::{HugurError, Result};
use crate::tensor::Tensor;

/// The operator contract: bind tensors, validate, run.
pub trait Layer {
    fn base(&self) -> &LayerBase;
    fn base_mut(&mut self) -> &mut LayerBase;

    /// Validates the current bindings without running anything.
    fn check(&self) -> Result<()>;

    /// Validates and then executes on the layer's device. On return the
    /// output tensors are fully written, on either device.
    fn forward(&self) -> Result<()>;

    fn name(&self) -> &str {
        self.base().name
    }

    fn device(&self) -> Device {
        self.base().device
    }

    fn set_input(&mut self, index: usize, tensor: Tensor) -> Result<()> {
        self.base_mut().set_slot(SlotKind::Input, index, tensor)
    }

    fn set_output(&mut self, index: usize, tensor: Tensor) -> Result<()> {
        self.base_mut().set_slot(SlotKind::Output, index, tensor)
    }

    fn input(&self, index: usize) -> Result<&Tensor> {
        self.base().slot(SlotKind::Input, index)
    }

    fn output(&self, index: usize) -> Result<&Tensor> {
        self.base().slot(SlotKind::Output, index)
    }
}

#[derive(Clone, Copy, Debug)]
enum SlotKind {
    Input,
    Output,
}

impl SlotKind {
    fn as_str(self) -> &'static str {
        match self {
            SlotKind::Input => "input",
            SlotKind::Output => "output",
        }
    }
}

/// Slot storage and validation helpers shared by every layer.
pub struct LayerBase {
    name: &'static str,
    device: Device,
    inputs: Vec<Option<Tensor>>,
    outputs: Vec<Option<Tensor>>,
}

impl LayerBase {
    pub fn new(name: &'static str, device: Device, inputs: usize, outputs: usize) -> Self {
        Self {
            name,
            device,
            inputs: vec![None; inputs],
            outputs: vec![None; outputs],
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    fn slots(&self, kind: SlotKind) -> &[Option<Tensor>] {
        match kind {
            SlotKind::Input => &self.inputs,
            SlotKind::Output => &self.outputs,
        }
    }

    fn set_slot(&mut self, kind: SlotKind, index: usize, tensor: Tensor) -> Result<()> {
        let name = self.name;
        let count = self.slots(kind).len();
        let slots = match kind {
            SlotKind::Input => &mut self.inputs,
            SlotKind::Output => &mut self.outputs,
        };
        let slot = slots.get_mut(index).ok_or_else(|| {
            HugurError::InvalidArgument(format!(
                "{name} has {count} {} slots, index {index} out of range",
                kind.as_str()
            ))
        })?;
        *slot = Some(tensor);
        Ok(())
    }

    fn slot(&self, kind: SlotKind, index: usize) -> Result<&Tensor> {
        self.slots(kind)
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                HugurError::InvalidArgument(format!(
                    "{} {} {index} is not bound",
                    self.name,
                    kind.as_str()
                ))
            })
    }

    /// One bound tensor checked for placement and element type.
    fn expect(&self, kind: SlotKind, index: usize, dtype: DType) -> Result<&Tensor> {
        let tensor = self.slot(kind, index)?;
        if tensor.device() != self.device {
            return Err(HugurError::InvalidArgument(format!(
                "{} {} {index} lives on {}, layer runs on {}",
                self.name,
                kind.as_str(),
                tensor.device(),
                self.device
            )));
        }
        if tensor.dtype() != dtype {
            return Err(HugurError::InvalidArgument(format!(
                "{} {} {index} is {}, expected {dtype}",
                self.name,
                kind.as_str(),
                tensor.dtype()
            )));
        }
        Ok(tensor)
    }

    fn expect_input(&self, index: usize, dtype: DType) -> Result<&Tensor> {
        self.expect(SlotKind::Input, index, dtype)
    }

    fn expect_output(&self, index: usize, dtype: DType) -> Result<&Tensor> {
        self.expect(SlotKind::Output, index, dtype)
    }

    fn expect_numel(&self, tensor: &Tensor, numel: usize, what: &str) -> Result<()> {
        if tensor.numel() != numel {
            return Err(HugurError::InvalidArgument(format!(
                "{} {what} has {} elements, expected {numel}",
                self.name,
                tensor.numel()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::allocator_for;

    #[test]
    fn unbound_slot_reads_are_invalid_argument() {
        let layer = VecAddLayer::new(Device::Cpu);
        let err = layer.input(0).unwrap_err();
        assert_eq!(err.code(), 6);
        let err = layer.output(0).unwrap_err();
        assert_eq!(err.code(), 6);
    }

    #[test]
    fn out_of_range_slot_writes_are_invalid_argument() {
        let mut layer = VecAddLayer::new(Device::Cpu);
        let t = Tensor::zeros(&[4], DType::F32, allocator_for(Device::Cpu)).unwrap();
        let err = layer.set_input(2, t).unwrap_err();
        assert_eq!(err.code(), 6);
    }

    #[test]
    fn rebinding_a_slot_replaces_the_tensor() {
        let mut layer = VecAddLayer::new(Device::Cpu);
        let a = Tensor::zeros(&[4], DType::F32, allocator_for(Device::Cpu)).unwrap();
        let b = Tensor::zeros(&[8], DType::F32, allocator_for(Device::Cpu)).unwrap();
        layer.set_input(0, a).unwrap();
        layer.set_input(0, b).unwrap();
        assert_eq!(layer.input(0).unwrap().numel(), 8);
    }
}
