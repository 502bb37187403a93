//! Embedding lookup: out[t, :] = table[ids[t], :].

use wgpu::util::DeviceExt;

use crate::gpu::primitives::{bind, compile_pipeline, workgroups_for, Binding};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct LookupUniforms {
    /// Total output elements: token_count * dim.
    count: u32,
    dim: u32,
    vocab_size: u32,
    _pad0: u32,
}

pub struct GpuLookup {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl GpuLookup {
    pub fn new(device: &wgpu::Device) -> Self {
        let (pipeline, layout) = compile_pipeline(
            device,
            "hugur lookup",
            wgpu::include_wgsl!("lookup.wgsl"),
            &[Binding::ReadOnly, Binding::ReadOnly, Binding::ReadWrite],
        );
        Self { pipeline, layout }
    }

    pub fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        ids: &wgpu::Buffer,
        table: &wgpu::Buffer,
        out: &wgpu::Buffer,
        token_count: u32,
        dim: u32,
        vocab_size: u32,
    ) {
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lookup uniforms"),
            contents: bytemuck::cast_slice(&[LookupUniforms {
                count: token_count * dim,
                dim,
                vocab_size,
                _pad0: 0,
            }]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = bind(
            device,
            "lookup bind group",
            &self.layout,
            &uniforms,
            &[ids, table, out],
        );

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("lookup pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(token_count * dim), 1, 1);
    }
}
