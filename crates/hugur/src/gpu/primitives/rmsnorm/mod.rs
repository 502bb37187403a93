//! Root-mean-square normalization over a single vector.
//!
//! One workgroup reduces the sum of squares in shared memory, then every
//! invocation writes its strided share of the normalized output.

use wgpu::util::DeviceExt;

use crate::gpu::primitives::{bind, compile_pipeline, Binding};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct RmsNormUniforms {
    n: u32,
    eps: f32,
    _pad0: u32,
    _pad1: u32,
}

pub struct GpuRmsNorm {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl GpuRmsNorm {
    pub fn new(device: &wgpu::Device) -> Self {
        let (pipeline, layout) = compile_pipeline(
            device,
            "hugur rmsnorm",
            wgpu::include_wgsl!("rmsnorm.wgsl"),
            &[Binding::ReadOnly, Binding::ReadOnly, Binding::ReadWrite],
        );
        Self { pipeline, layout }
    }

    pub fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        input: &wgpu::Buffer,
        weight: &wgpu::Buffer,
        out: &wgpu::Buffer,
        n: u32,
        eps: f32,
    ) {
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("rmsnorm uniforms"),
            contents: bytemuck::cast_slice(&[RmsNormUniforms {
                n,
                eps,
                _pad0: 0,
                _pad1: 0,
            }]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = bind(
            device,
            "rmsnorm bind group",
            &self.layout,
            &uniforms,
            &[input, weight, out],
        );

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("rmsnorm pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        // Single workgroup; the shader reduces across it.
        pass.dispatch_workgroups(1, 1, 1);
    }
}
