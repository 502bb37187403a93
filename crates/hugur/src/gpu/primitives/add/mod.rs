//! Element-wise vector addition.

use wgpu::util::DeviceExt;

use crate::gpu::primitives::{bind, compile_pipeline, workgroups_for, Binding};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct AddUniforms {
    count: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}

pub struct GpuAdd {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl GpuAdd {
    pub fn new(device: &wgpu::Device) -> Self {
        let (pipeline, layout) = compile_pipeline(
            device,
            "hugur add",
            wgpu::include_wgsl!("add.wgsl"),
            &[Binding::ReadOnly, Binding::ReadOnly, Binding::ReadWrite],
        );
        Self { pipeline, layout }
    }

    /// out[i] = a[i] + b[i] for i in 0..count.
    pub fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        a: &wgpu::Buffer,
        b: &wgpu::Buffer,
        out: &wgpu::Buffer,
        count: u32,
    ) {
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("add uniforms"),
            contents: bytemuck::cast_slice(&[AddUniforms {
                count,
                _pad0: 0,
                _pad1: 0,
                _pad2: 0,
            }]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = bind(device, "add bind group", &self.layout, &uniforms, &[a, b, out]);

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("add pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(count), 1, 1);
    }
}
