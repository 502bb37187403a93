//! Host memory allocator.

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;

use crate::alloc::{DeviceAllocator, HostPtr, RawBlock};
use crate::device::Device;
use crate::error::HugurError;
use crate::fatal;

/// 32-byte alignment so f32 rows are usable by SIMD kernels.
const HOST_ALIGNMENT: usize = 32;

/// Allocates aligned host memory through the global allocator.
pub struct CpuAllocator;

impl CpuAllocator {
    fn layout(byte_size: usize) -> Layout {
        // Only fails on size overflow, which no model buffer reaches.
        Layout::from_size_align(byte_size, HOST_ALIGNMENT)
            .expect("host allocation layout overflow")
    }
}

impl DeviceAllocator for CpuAllocator {
    fn device(&self) -> Device {
        Device::Cpu
    }

    fn allocate(&self, byte_size: usize) -> RawBlock {
        if byte_size == 0 {
            fatal!(HugurError::InvalidArgument(
                "cannot allocate a zero-sized host block".into()
            ));
        }
        let layout = Self::layout(byte_size);
        // Safety: layout is non-zero sized.
        let raw = unsafe { alloc(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            log::error!("host allocation of {byte_size} bytes failed");
            handle_alloc_error(layout);
        };
        log::trace!("host alloc: {byte_size} bytes at {:p}", ptr.as_ptr());
        RawBlock::Host(HostPtr(ptr))
    }

    fn release(&self, block: &RawBlock, byte_size: usize) {
        match block {
            RawBlock::Host(ptr) => {
                log::trace!("host free: {byte_size} bytes at {:p}", ptr.as_ptr());
                // Safety: the block came from `allocate` with the same layout.
                unsafe { dealloc(ptr.as_ptr(), Self::layout(byte_size)) };
            }
            RawBlock::Wgpu { .. } => fatal!(HugurError::InternalError(
                "host allocator asked to release an accelerator block".into()
            )),
        }
    }

    fn zero(&self, block: &RawBlock, byte_size: usize) {
        match block {
            RawBlock::Host(ptr) => {
                // Safety: the block is live and `byte_size` bytes long.
                unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, byte_size) };
            }
            RawBlock::Wgpu { .. } => fatal!(HugurError::InternalError(
                "host allocator asked to zero an accelerator block".into()
            )),
        }
    }
}
