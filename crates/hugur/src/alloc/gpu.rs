//! Accelerator memory allocator backed by a wgpu device.

use std::sync::Arc;

use crate::alloc::{DeviceAllocator, RawBlock};
use crate::device::Device;
use crate::error::HugurError;
use crate::fatal;
use crate::gpu::WgpuContext;

/// Allocates storage buffers on the wgpu device owned by a [`WgpuContext`].
pub struct WgpuAllocator {
    context: Arc<WgpuContext>,
}

impl WgpuAllocator {
    pub fn new(context: Arc<WgpuContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<WgpuContext> {
        &self.context
    }
}

impl DeviceAllocator for WgpuAllocator {
    fn device(&self) -> Device {
        Device::Wgpu
    }

    fn allocate(&self, byte_size: usize) -> RawBlock {
        if byte_size == 0 {
            fatal!(HugurError::InvalidArgument(
                "cannot allocate a zero-sized device block".into()
            ));
        }
        let buffer = self.context.create_storage_buffer(byte_size, "hugur buffer");
        log::trace!("device alloc: {byte_size} bytes");
        RawBlock::Wgpu {
            buffer: Arc::new(buffer),
            context: self.context.clone(),
        }
    }

    fn release(&self, block: &RawBlock, byte_size: usize) {
        match block {
            RawBlock::Wgpu { buffer, .. } => {
                log::trace!("device free: {byte_size} bytes");
                buffer.destroy();
            }
            RawBlock::Host(_) => fatal!(HugurError::InternalError(
                "accelerator allocator asked to release a host block".into()
            )),
        }
    }

    fn zero(&self, block: &RawBlock, _byte_size: usize) {
        match block {
            RawBlock::Wgpu { buffer, context } => context.zero_buffer(buffer),
            RawBlock::Host(_) => fatal!(HugurError::InternalError(
                "accelerator allocator asked to zero a host block".into()
            )),
        }
    }
}
