//! Rotary position encoding applied in place to query and key vectors.

use wgpu::util::DeviceExt;

use crate::gpu::primitives::{bind, compile_pipeline, workgroups_for, Binding};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct RopeUniforms {
    dim: u32,
    kv_dim: u32,
    head_size: u32,
    _pad0: u32,
}

pub struct GpuRope {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl GpuRope {
    pub fn new(device: &wgpu::Device) -> Self {
        let (pipeline, layout) = compile_pipeline(
            device,
            "hugur rope",
            wgpu::include_wgsl!("rope.wgsl"),
            &[
                Binding::ReadOnly,  // pos
                Binding::ReadOnly,  // sin cache
                Binding::ReadOnly,  // cos cache
                Binding::ReadWrite, // q
                Binding::ReadWrite, // k
            ],
        );
        Self { pipeline, layout }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pos: &wgpu::Buffer,
        sin_cache: &wgpu::Buffer,
        cos_cache: &wgpu::Buffer,
        q: &wgpu::Buffer,
        k: &wgpu::Buffer,
        dim: u32,
        kv_dim: u32,
        head_size: u32,
    ) {
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("rope uniforms"),
            contents: bytemuck::cast_slice(&[RopeUniforms {
                dim,
                kv_dim,
                head_size,
                _pad0: 0,
            }]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = bind(
            device,
            "rope bind group",
            &self.layout,
            &uniforms,
            &[pos, sin_cache, cos_cache, q, k],
        );

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("rope pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(dim / 2), 1, 1);
    }
}
