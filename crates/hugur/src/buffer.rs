//! Ownership-aware handle over a raw device memory region.
//!
//! A [`Buffer`] is the unit of memory lifetime management. It is either
//! *owned* (allocated through a [`DeviceAllocator`] at construction and
//! released through the same allocator exactly once, when the last holder
//! drops) or *external* (wrapping caller-supplied memory that is never
//! released here). Cloning a `Buffer` shares the underlying memory; lifetime
//! extends to the last holder.
//!
//! Shared memory carries no internal synchronization. Callers coordinating
//! concurrent passes over one buffer are responsible for serialization.

use std::sync::Arc;

use crate::alloc::{DeviceAllocator, HostPtr, RawBlock};
use crate::device::Device;
use crate::error::{HugurError, Result};
use crate::gpu::WgpuContext;

struct BufferInner {
    byte_size: usize,
    block: RawBlock,
    external: bool,
    allocator: Option<Arc<dyn DeviceAllocator>>,
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        // External memory belongs to the supplying caller; never touch it.
        if self.external {
            return;
        }
        if let Some(allocator) = &self.allocator {
            allocator.release(&self.block, self.byte_size);
        }
    }
}

/// Reference-counted handle over one raw memory region of fixed byte size
/// and device affinity.
#[derive(Clone)]
pub struct Buffer {
    inner: Arc<BufferInner>,
}

impl Buffer {
    /// Allocates `byte_size` bytes through `allocator` (owned mode).
    ///
    /// Allocation failure inside the allocator is fatal; a zero byte size is
    /// a recoverable `InvalidArgument` since it is a caller mistake the
    /// pipeline can report before any numeric work starts.
    pub fn new(byte_size: usize, allocator: Arc<dyn DeviceAllocator>) -> Result<Buffer> {
        if byte_size == 0 {
            return Err(HugurError::InvalidArgument(
                "buffer byte size must be greater than zero".into(),
            ));
        }
        let block = allocator.allocate(byte_size);
        Ok(Buffer {
            inner: Arc::new(BufferInner {
                byte_size,
                block,
                external: false,
                allocator: Some(allocator),
            }),
        })
    }

    /// Wraps caller-owned host memory (external mode). The memory is never
    /// released by this buffer; the caller retains responsibility for it.
    ///
    /// # Safety
    /// `ptr` must point to at least `byte_size` bytes that stay live and
    /// valid for the lifetime of every clone of the returned buffer.
    pub unsafe fn from_host_ptr(ptr: *mut u8, byte_size: usize) -> Result<Buffer> {
        if byte_size == 0 {
            return Err(HugurError::InvalidArgument(
                "buffer byte size must be greater than zero".into(),
            ));
        }
        let Some(host) = HostPtr::new(ptr) else {
            return Err(HugurError::InvalidArgument(
                "external buffer pointer must be non-null".into(),
            ));
        };
        Ok(Buffer {
            inner: Arc::new(BufferInner {
                byte_size,
                block: RawBlock::Host(host),
                external: true,
                allocator: None,
            }),
        })
    }

    /// Wraps caller-owned accelerator memory (external mode).
    pub fn from_wgpu(
        buffer: Arc<wgpu::Buffer>,
        byte_size: usize,
        context: Arc<WgpuContext>,
    ) -> Result<Buffer> {
        if byte_size == 0 {
            return Err(HugurError::InvalidArgument(
                "buffer byte size must be greater than zero".into(),
            ));
        }
        if (buffer.size() as usize) < byte_size {
            return Err(HugurError::InvalidArgument(format!(
                "external device buffer holds {} bytes, {} requested",
                buffer.size(),
                byte_size
            )));
        }
        Ok(Buffer {
            inner: Arc::new(BufferInner {
                byte_size,
                block: RawBlock::Wgpu { buffer, context },
                external: true,
                allocator: None,
            }),
        })
    }

    pub fn byte_size(&self) -> usize {
        self.inner.byte_size
    }

    pub fn device(&self) -> Device {
        self.inner.block.device()
    }

    pub fn is_external(&self) -> bool {
        self.inner.external
    }

    /// Number of live holders currently sharing this memory.
    pub fn use_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Raw host pointer, if this buffer lives on the host.
    pub fn host_ptr(&self) -> Option<*mut u8> {
        match &self.inner.block {
            RawBlock::Host(ptr) => Some(ptr.as_ptr()),
            RawBlock::Wgpu { .. } => None,
        }
    }

    /// Device buffer and its context, if this buffer lives on the accelerator.
    pub fn wgpu_parts(&self) -> Option<(&Arc<wgpu::Buffer>, &Arc<WgpuContext>)> {
        match &self.inner.block {
            RawBlock::Wgpu { buffer, context } => Some((buffer, context)),
            RawBlock::Host(_) => None,
        }
    }

    /// Zero-fills the whole region on its device.
    pub fn zero(&self) {
        match &self.inner.block {
            RawBlock::Host(ptr) => {
                // Safety: the block is live for byte_size bytes.
                unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, self.inner.byte_size) };
            }
            RawBlock::Wgpu { buffer, context } => context.zero_buffer(buffer),
        }
    }

    /// Overwrites the start of this buffer with `min(self.size, src.size)`
    /// bytes from `src`, selecting the transfer direction from the two
    /// device kinds. Never frees or reallocates the destination memory.
    ///
    /// Copying between buffers of different sizes is not an error: only the
    /// overlapping byte range moves and the destination tail is untouched.
    /// Sizing buffers consistently is the caller's responsibility.
    ///
    /// Transfers touching the accelerator must be 4-byte aligned
    /// (`wgpu::COPY_BUFFER_ALIGNMENT`).
    pub fn copy_from(&self, src: &Buffer) -> Result<()> {
        let n = self.inner.byte_size.min(src.inner.byte_size);
        match (&self.inner.block, &src.inner.block) {
            (RawBlock::Host(dst), RawBlock::Host(from)) => {
                // Safety: both regions are live for at least n bytes; overlap
                // would require aliased external wrapping, which the shared-
                // memory contract forbids.
                unsafe { std::ptr::copy(from.as_ptr(), dst.as_ptr(), n) };
                Ok(())
            }
            (RawBlock::Wgpu { buffer, context }, RawBlock::Host(from)) => {
                check_copy_alignment(n)?;
                // Safety: src region is live for n bytes.
                let bytes = unsafe { std::slice::from_raw_parts(from.as_ptr(), n) };
                context.upload(buffer, bytes);
                Ok(())
            }
            (RawBlock::Host(dst), RawBlock::Wgpu { buffer, context }) => {
                check_copy_alignment(n)?;
                let bytes = context.read_buffer(buffer, n)?;
                // Safety: dst region is live for n bytes.
                unsafe {
                    std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst.as_ptr(), n);
                }
                Ok(())
            }
            (
                RawBlock::Wgpu {
                    buffer: dst,
                    context,
                },
                RawBlock::Wgpu { buffer: from, .. },
            ) => {
                check_copy_alignment(n)?;
                context.copy_buffer(from, dst, n)
            }
        }
    }
}

fn check_copy_alignment(n: usize) -> Result<()> {
    if n as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
        return Err(HugurError::InvalidArgument(format!(
            "accelerator copies must be {}-byte aligned, got {n} bytes",
            wgpu::COPY_BUFFER_ALIGNMENT
        )));
    }
    Ok(())
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("byte_size", &self.inner.byte_size)
            .field("device", &self.device())
            .field("external", &self.inner.external)
            .field("use_count", &self.use_count())
            .finish()
    }
}
