//! Accelerator device context.
//!
//! Wraps the wgpu device and queue and provides the synchronous transfer
//! primitives the buffer layer builds on: upload, staging readback, on-device
//! copy and clear. Compute pipelines are compiled once per context and cached.

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use wgpu::{
    Adapter, BufferDescriptor, BufferUsages, DeviceDescriptor, Instance, InstanceDescriptor,
    PowerPreference, RequestAdapterOptions,
};

use crate::error::HugurError;
use crate::gpu::primitives::GpuKernels;

pub struct WgpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter: Adapter,
    kernels: OnceLock<GpuKernels>,
}

impl WgpuContext {
    pub async fn new() -> Result<Arc<Self>> {
        let instance = Instance::new(&InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::empty(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await?;

        let info = adapter.get_info();
        log::info!(
            "accelerator adapter: {} ({:?}, {:?})",
            info.name,
            info.device_type,
            info.backend
        );

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("hugur"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                ..Default::default()
            })
            .await?;

        Ok(Arc::new(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter,
            kernels: OnceLock::new(),
        }))
    }

    /// Blocking constructor for the synchronous runtime surface.
    pub fn create() -> Result<Arc<Self>> {
        pollster::block_on(Self::new())
    }

    /// Probes for a usable adapter without committing to a device.
    ///
    /// The allocator registry treats a missing accelerator as fatal; callers
    /// for which the device is optional (tests, capability detection) use
    /// this instead.
    pub fn is_available() -> bool {
        pollster::block_on(async {
            let instance = Instance::new(&InstanceDescriptor {
                backends: wgpu::Backends::PRIMARY,
                flags: wgpu::InstanceFlags::empty(),
                ..Default::default()
            });
            instance
                .request_adapter(&RequestAdapterOptions {
                    power_preference: PowerPreference::HighPerformance,
                    force_fallback_adapter: false,
                    compatible_surface: None,
                })
                .await
                .is_ok()
        })
    }

    /// Compute pipelines for this context, compiled on first use.
    pub fn kernels(&self) -> &GpuKernels {
        self.kernels.get_or_init(|| GpuKernels::new(&self.device))
    }

    /// Blocks until all submitted work has completed on the device.
    pub fn synchronize(&self) -> crate::Result<()> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| HugurError::InternalError(format!("device poll failed: {err}")))?;
        Ok(())
    }

    /// Creates a storage buffer usable as compute input/output and as a copy
    /// source/target. Sizes are rounded up to the copy alignment so whole-
    /// buffer transfers stay legal.
    pub fn create_storage_buffer(&self, byte_size: usize, label: &str) -> wgpu::Buffer {
        let size = (byte_size as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        self.device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Writes `bytes` to the start of `buffer` and flushes the queue.
    pub fn upload(&self, buffer: &wgpu::Buffer, bytes: &[u8]) {
        self.queue.write_buffer(buffer, 0, bytes);
        self.queue.submit(std::iter::empty());
    }

    /// Reads the first `byte_size` bytes of `buffer` back to the host through
    /// a staging buffer. Blocks until the copy and map have completed.
    pub fn read_buffer(&self, buffer: &wgpu::Buffer, byte_size: usize) -> crate::Result<Vec<u8>> {
        let size = (byte_size as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let staging = self.device.create_buffer(&BufferDescriptor {
            label: Some("hugur readback staging"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("hugur readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.synchronize()?;

        pollster::block_on(rx.receive())
            .ok_or_else(|| HugurError::InternalError("readback channel closed".into()))?
            .map_err(|err| HugurError::InternalError(format!("buffer map failed: {err}")))?;

        let data = slice.get_mapped_range()[..byte_size].to_vec();
        staging.unmap();
        Ok(data)
    }

    /// Copies `byte_size` bytes between two device buffers and waits for the
    /// copy to complete.
    pub fn copy_buffer(
        &self,
        src: &wgpu::Buffer,
        dst: &wgpu::Buffer,
        byte_size: usize,
    ) -> crate::Result<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("hugur device copy"),
            });
        encoder.copy_buffer_to_buffer(src, 0, dst, 0, byte_size as u64);
        self.queue.submit(std::iter::once(encoder.finish()));
        self.synchronize()
    }

    /// Clears the whole buffer to zero on the device.
    pub fn zero_buffer(&self, buffer: &wgpu::Buffer) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("hugur clear"),
            });
        encoder.clear_buffer(buffer, 0, None);
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl std::fmt::Debug for WgpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuContext")
            .field("adapter", &self.adapter.get_info().name)
            .finish_non_exhaustive()
    }
}
