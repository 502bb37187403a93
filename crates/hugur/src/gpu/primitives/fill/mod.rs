//! Device-side constant fill of an f32 buffer.

use wgpu::util::DeviceExt;

use crate::gpu::primitives::{bind, compile_pipeline, workgroups_for, Binding};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct FillUniforms {
    count: u32,
    value: f32,
    _pad0: u32,
    _pad1: u32,
}

pub struct GpuFill {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl GpuFill {
    pub fn new(device: &wgpu::Device) -> Self {
        let (pipeline, layout) = compile_pipeline(
            device,
            "hugur fill",
            wgpu::include_wgsl!("fill.wgsl"),
            &[Binding::ReadWrite],
        );
        Self { pipeline, layout }
    }

    /// Sets the first `count` f32 values of `out` to `value`.
    pub fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        out: &wgpu::Buffer,
        count: u32,
        value: f32,
    ) {
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("fill uniforms"),
            contents: bytemuck::cast_slice(&[FillUniforms {
                count,
                value,
                _pad0: 0,
                _pad1: 0,
            }]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = bind(device, "fill bind group", &self.layout, &uniforms, &[out]);

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("fill pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(count), 1, 1);
    }
}
