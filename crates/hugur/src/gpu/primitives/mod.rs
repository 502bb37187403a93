//! WGSL compute primitives, one module per operation.
//!
//! Each primitive owns a compiled pipeline and bind group layout and exposes
//! an `encode` that records one compute pass. Primitives hold no device
//! state; the caller supplies the encoder and buffers. [`GpuKernels`] bundles
//! one instance of each and is cached per [`crate::WgpuContext`].

pub mod add;
pub mod fill;
pub mod lookup;
pub mod matmul;
pub mod mha;
pub mod rmsnorm;
pub mod rope;
pub mod swiglu;

pub use add::GpuAdd;
pub use fill::GpuFill;
pub use lookup::GpuLookup;
pub use matmul::GpuMatmul;
pub use mha::{GpuMha, MhaParams};
pub use rmsnorm::GpuRmsNorm;
pub use rope::GpuRope;
pub use swiglu::GpuSwiglu;

/// All compute pipelines for one device, compiled eagerly together.
pub struct GpuKernels {
    pub fill: GpuFill,
    pub add: GpuAdd,
    pub matmul: GpuMatmul,
    pub lookup: GpuLookup,
    pub rmsnorm: GpuRmsNorm,
    pub rope: GpuRope,
    pub swiglu: GpuSwiglu,
    pub mha: GpuMha,
}

impl GpuKernels {
    pub fn new(device: &wgpu::Device) -> Self {
        log::debug!("compiling accelerator compute pipelines");
        Self {
            fill: GpuFill::new(device),
            add: GpuAdd::new(device),
            matmul: GpuMatmul::new(device),
            lookup: GpuLookup::new(device),
            rmsnorm: GpuRmsNorm::new(device),
            rope: GpuRope::new(device),
            swiglu: GpuSwiglu::new(device),
            mha: GpuMha::new(device),
        }
    }
}

/// Storage-binding access mode for [`compile_pipeline`].
#[derive(Clone, Copy)]
pub(crate) enum Binding {
    ReadOnly,
    ReadWrite,
}

/// Compiles a compute pipeline whose binding 0 is a uniform buffer and whose
/// remaining bindings are storage buffers in the given access modes.
pub(crate) fn compile_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: wgpu::ShaderModuleDescriptor<'_>,
    storage: &[Binding],
) -> (wgpu::ComputePipeline, wgpu::BindGroupLayout) {
    let module = device.create_shader_module(shader);

    let mut entries = vec![wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }];
    for (i, mode) in storage.iter().enumerate() {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: (i + 1) as u32,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage {
                    read_only: matches!(mode, Binding::ReadOnly),
                },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: Some("main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    });
    (pipeline, bind_group_layout)
}

/// Builds a bind group pairing a uniform buffer with storage buffers, in
/// binding order.
pub(crate) fn bind(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    uniforms: &wgpu::Buffer,
    buffers: &[&wgpu::Buffer],
) -> wgpu::BindGroup {
    let mut entries = vec![wgpu::BindGroupEntry {
        binding: 0,
        resource: uniforms.as_entire_binding(),
    }];
    for (i, buffer) in buffers.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: (i + 1) as u32,
            resource: buffer.as_entire_binding(),
        });
    }
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}

/// Workgroup count for `n` items at 256 invocations per workgroup.
pub(crate) fn workgroups_for(n: u32) -> u32 {
    n.div_ceil(256)
}
