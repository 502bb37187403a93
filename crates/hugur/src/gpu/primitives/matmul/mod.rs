//! Vector-matrix multiplication: out = scale * (weight @ input).
//!
//! Weight is row-major [m, k], input is a length-k vector, output length m.
//! One invocation per output row; decode-path shapes keep k in the thousands,
//! so the per-row loop is acceptable for a reference device kernel.

use wgpu::util::DeviceExt;

use crate::gpu::primitives::{bind, compile_pipeline, workgroups_for, Binding};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct MatmulUniforms {
    m: u32,
    k: u32,
    scale: f32,
    _pad0: u32,
}

pub struct GpuMatmul {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl GpuMatmul {
    pub fn new(device: &wgpu::Device) -> Self {
        let (pipeline, layout) = compile_pipeline(
            device,
            "hugur matmul",
            wgpu::include_wgsl!("matmul.wgsl"),
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
        m: u32,
        k: u32,
        scale: f32,
    ) {
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("matmul uniforms"),
            contents: bytemuck::cast_slice(&[MatmulUniforms {
                m,
                k,
                scale,
                _pad0: 0,
            }]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = bind(
            device,
            "matmul bind group",
            &self.layout,
            &uniforms,
            &[input, weight, out],
        );

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("matmul pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(m), 1, 1);
    }
}
