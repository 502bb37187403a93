//! Gated activation: out = silu(gate) * up.

use wgpu::util::DeviceExt;

use crate::gpu::primitives::{bind, compile_pipeline, workgroups_for, Binding};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SwigluUniforms {
    count: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}

pub struct GpuSwiglu {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl GpuSwiglu {
    pub fn new(device: &wgpu::Device) -> Self {
        let (pipeline, layout) = compile_pipeline(
            device,
            "hugur swiglu",
            wgpu::include_wgsl!("swiglu.wgsl"),
            &[Binding::ReadOnly, Binding::ReadOnly, Binding::ReadWrite],
        );
        Self { pipeline, layout }
    }

    pub fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        gate: &wgpu::Buffer,
        up: &wgpu::Buffer,
        out: &wgpu::Buffer,
        count: u32,
    ) {
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("swiglu uniforms"),
            contents: bytemuck::cast_slice(&[SwigluUniforms {
                count,
                _pad0: 0,
                _pad1: 0,
                _pad2: 0,
            }]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = bind(
            device,
            "swiglu bind group",
            &self.layout,
            &uniforms,
            &[gate, up, out],
        );

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("swiglu pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(count), 1, 1);
    }
}
