//! wgpu accelerator backend: device context and compute primitives.

pub mod context;
pub mod primitives;

pub use context::WgpuContext;
pub use primitives::GpuKernels;
