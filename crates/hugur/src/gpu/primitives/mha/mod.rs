//! Single-position multi-head attention over the key/value caches.
//!
//! One workgroup per head; the reference shader favors clarity over raw
//! throughput, matching the CPU kernel bit layout exactly: caches hold
//! [seq_len, kv_dim] rows per layer, addressed through `layer_offset`.

use wgpu::util::DeviceExt;

use crate::gpu::primitives::{bind, compile_pipeline, Binding};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct MhaUniforms {
    pos: u32,
    seq_len: u32,
    kv_dim: u32,
    kv_mul: u32,
    head_size: u32,
    layer_offset: u32,
    scale: f32,
    _pad0: u32,
}

pub struct GpuMha {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl GpuMha {
    pub fn new(device: &wgpu::Device) -> Self {
        let (pipeline, layout) = compile_pipeline(
            device,
            "hugur mha",
            wgpu::include_wgsl!("mha.wgsl"),
            &[
                Binding::ReadOnly,  // query
                Binding::ReadOnly,  // key cache
                Binding::ReadOnly,  // value cache
                Binding::ReadWrite, // score scratch
                Binding::ReadWrite, // output
            ],
        );
        Self { pipeline, layout }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        query: &wgpu::Buffer,
        key_cache: &wgpu::Buffer,
        value_cache: &wgpu::Buffer,
        score: &wgpu::Buffer,
        out: &wgpu::Buffer,
        uniforms: MhaParams,
    ) {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mha uniforms"),
            contents: bytemuck::cast_slice(&[MhaUniforms {
                pos: uniforms.pos,
                seq_len: uniforms.seq_len,
                kv_dim: uniforms.kv_dim,
                kv_mul: uniforms.kv_mul,
                head_size: uniforms.head_size,
                layer_offset: uniforms.layer_offset,
                scale: uniforms.scale,
                _pad0: 0,
            }]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = bind(
            device,
            "mha bind group",
            &self.layout,
            &uniform_buffer,
            &[query, key_cache, value_cache, score, out],
        );

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("mha pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(uniforms.head_num, 1, 1);
    }
}

/// Host-side attention parameters for [`GpuMha::encode`].
#[derive(Clone, Copy, Debug)]
pub struct MhaParams {
    pub pos: u32,
    pub head_num: u32,
    pub seq_len: u32,
    pub kv_dim: u32,
    pub kv_mul: u32,
    pub head_size: u32,
    pub layer_offset: u32,
    pub scale: f32,
}
