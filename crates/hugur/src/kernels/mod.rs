//! Kernel function table and device dispatch.
//!
//! Each operation has one typed function-pointer contract and a
//! `get_<op>_kernel(device)` lookup returning the implementation for that
//! device. Lookups are pure O(1) matches with no mutable state and may be
//! called concurrently. A missing (operation, device) pair is a build or
//! configuration error, never a data error: the lookup fails fatally with a
//! diagnostic naming the device rather than silently falling back.
//!
//! New operations extend the table; existing entries' signatures never
//! change, so already-bound layers stay compatible.

pub mod cpu;
pub mod gpu;

pub use cpu::sin_cos_cache;

use crate::device::Device;
use crate::error::{HugurError, Result};
use crate::fatal;
use crate::tensor::Tensor;

/// out = in1 + in2, element-wise f32.
pub type AddKernel = fn(in1: &Tensor, in2: &Tensor, out: &Tensor) -> Result<()>;

/// out = scale * (weight[m,k] @ input[k]).
pub type MatmulKernel = fn(input: &Tensor, weight: &Tensor, out: &Tensor, scale: f32) -> Result<()>;

/// out = (weight[i8, m,k] @ input[k]) with per-group scales.
pub type MatmulQuantKernel = fn(
    input: &Tensor,
    weight: &Tensor,
    scales: &Tensor,
    group_size: usize,
    out: &Tensor,
) -> Result<()>;

/// out[t, :] = table[tokens[t], :].
pub type EmbeddingKernel =
    fn(tokens: &Tensor, table: &Tensor, out: &Tensor, vocab_size: usize) -> Result<()>;

/// Rotates query/key pairs in place for the bound position.
pub type RopeKernel = fn(args: &RopeArgs) -> Result<()>;

/// out = silu(in1) * in2, element-wise.
pub type SwigluKernel = fn(in1: &Tensor, in2: &Tensor, out: &Tensor) -> Result<()>;

/// out = weight * input / rms(input).
pub type RmsNormKernel =
    fn(input: &Tensor, weight: &Tensor, out: &Tensor, eps: f32) -> Result<()>;

/// In-place softmax over the whole tensor.
pub type SoftmaxKernel = fn(t: &Tensor) -> Result<()>;

/// In-place multiply by a scalar.
pub type ScaleKernel = fn(t: &Tensor, scale: f32) -> Result<()>;

/// out[j] += scale[t] * value[t*stride + j] for t in 0..=pos, j in 0..size.
pub type ScaleSumKernel = fn(
    value: &Tensor,
    scale: &Tensor,
    out: &Tensor,
    pos: usize,
    size: usize,
    stride: usize,
) -> Result<()>;

/// Single-position multi-head attention over the kv caches.
pub type MhaKernel = fn(args: &MhaArgs) -> Result<()>;

/// Arguments for rotary position encoding.
///
/// `q` has `dim` elements, `k` has `kv_dim`; both are rotated in place.
/// `pos` is a single-element i32 tensor; the sin/cos caches are
/// [max_seq_len, head_size].
pub struct RopeArgs<'a> {
    pub dim: usize,
    pub kv_dim: usize,
    pub head_size: usize,
    pub q: &'a Tensor,
    pub k: &'a Tensor,
    pub pos: &'a Tensor,
    pub sin_cache: &'a Tensor,
    pub cos_cache: &'a Tensor,
}

/// Arguments for multi-head attention at one decode position.
///
/// Caches hold [seq_len, kv_dim] rows per layer; `layer_index` selects the
/// layer. `score` is [head_num, seq_len] scratch. `kv_mul` is the number of
/// query heads sharing one kv head.
pub struct MhaArgs<'a> {
    pub pos: usize,
    pub head_num: usize,
    pub layer_index: usize,
    pub seq_len: usize,
    pub kv_dim: usize,
    pub kv_mul: usize,
    pub head_size: usize,
    pub query: &'a Tensor,
    pub score: &'a Tensor,
    pub key_cache: &'a Tensor,
    pub value_cache: &'a Tensor,
    pub output: &'a Tensor,
}

pub fn get_add_kernel(device: Device) -> AddKernel {
    match device {
        Device::Cpu => cpu::add,
        Device::Wgpu => gpu::add,
    }
}

pub fn get_matmul_kernel(device: Device) -> MatmulKernel {
    match device {
        Device::Cpu => cpu::matmul,
        Device::Wgpu => gpu::matmul,
    }
}

pub fn get_matmul_quant8_kernel(device: Device) -> MatmulQuantKernel {
    match device {
        Device::Cpu => cpu::matmul_quant8,
        other => fatal!(HugurError::FunctionNotImplemented(format!(
            "quantized matmul kernel has no {other} implementation"
        ))),
    }
}

pub fn get_embedding_kernel(device: Device) -> EmbeddingKernel {
    match device {
        Device::Cpu => cpu::embedding,
        Device::Wgpu => gpu::embedding,
    }
}

pub fn get_rope_kernel(device: Device) -> RopeKernel {
    match device {
        Device::Cpu => cpu::rope,
        Device::Wgpu => gpu::rope,
    }
}

pub fn get_swiglu_kernel(device: Device) -> SwigluKernel {
    match device {
        Device::Cpu => cpu::swiglu,
        Device::Wgpu => gpu::swiglu,
    }
}

pub fn get_rmsnorm_kernel(device: Device) -> RmsNormKernel {
    match device {
        Device::Cpu => cpu::rmsnorm,
        Device::Wgpu => gpu::rmsnorm,
    }
}

pub fn get_softmax_kernel(device: Device) -> SoftmaxKernel {
    match device {
        Device::Cpu => cpu::softmax_inplace,
        other => fatal!(HugurError::FunctionNotImplemented(format!(
            "softmax kernel has no {other} implementation"
        ))),
    }
}

pub fn get_scale_kernel(device: Device) -> ScaleKernel {
    match device {
        Device::Cpu => cpu::scale_inplace,
        other => fatal!(HugurError::FunctionNotImplemented(format!(
            "scale kernel has no {other} implementation"
        ))),
    }
}

pub fn get_scale_sum_kernel(device: Device) -> ScaleSumKernel {
    match device {
        Device::Cpu => cpu::scale_sum,
        other => fatal!(HugurError::FunctionNotImplemented(format!(
            "scale-sum kernel has no {other} implementation"
        ))),
    }
}

pub fn get_mha_kernel(device: Device) -> MhaKernel {
    match device {
        Device::Cpu => cpu::mha,
        Device::Wgpu => gpu::mha,
    }
}
