//! Runtime core for small transformer inference engines.
//!
//! Hugur manages numeric buffers that may live on the host CPU or on a wgpu
//! accelerator, and dispatches per-operation kernels (embedding lookup, RoPE,
//! RMSNorm, matmul, SwiGLU, softmax, multi-head attention, vector add) to a
//! device-specific implementation chosen at runtime. A model-forward pipeline
//! built on top of this crate never needs to know which device it runs on:
//! it allocates [`Buffer`]s through the allocator registry, wires them into
//! layers, validates once with `check()` and then calls `forward()` per step.
//!
//! The crate is deliberately synchronous: every kernel invocation blocks the
//! calling thread until the device has finished, so a buffer written by one
//! layer is fully visible to the next.

pub mod alloc;
pub mod buffer;
pub mod device;
pub mod dtype;
pub mod error;
pub mod gpu;
pub mod kernels;
pub mod layers;
pub mod tensor;

pub use alloc::{allocator_for, AllocatorRegistry, DeviceAllocator};
pub use buffer::Buffer;
pub use device::Device;
pub use dtype::DType;
pub use error::{HugurError, Result};
pub use gpu::WgpuContext;
pub use tensor::Tensor;

// Prelude for easy imports
pub mod prelude {
    pub use crate::alloc::{allocator_for, DeviceAllocator};
    pub use crate::buffer::Buffer;
    pub use crate::device::Device;
    pub use crate::dtype::DType;
    pub use crate::error::{HugurError, Result};
    pub use crate::layers::Layer;
    pub use crate::tensor::Tensor;
}

#[cfg(test)]
pub mod tests;
