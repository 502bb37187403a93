//! Per-device memory allocation strategies.
//!
//! One allocator exists per device kind for the lifetime of the process,
//! handed out by [`AllocatorRegistry`]. Allocators are stateless with respect
//! to individual allocations: they never track what they handed out, and
//! [`crate::Buffer`] alone is responsible for lifetime.

pub mod cpu;
pub mod gpu;
pub mod registry;

pub use cpu::CpuAllocator;
pub use gpu::WgpuAllocator;
pub use registry::{allocator_for, AllocatorRegistry};

use std::ptr::NonNull;
use std::sync::Arc;

use crate::device::Device;
use crate::gpu::WgpuContext;

/// Raw host allocation. Only a tracking handle; accesses go through
/// `as_ptr()` and are the caller's responsibility to serialize.
pub struct HostPtr(NonNull<u8>);

// Safety: HostPtr is a plain address. The runtime's contract makes callers
// responsible for serializing access to shared buffer memory.
unsafe impl Send for HostPtr {}
unsafe impl Sync for HostPtr {}

impl HostPtr {
    /// Wraps a non-null raw pointer.
    ///
    /// # Safety
    /// `ptr` must point to a live allocation for as long as the `HostPtr`
    /// is used to access it.
    pub unsafe fn new(ptr: *mut u8) -> Option<Self> {
        NonNull::new(ptr).map(HostPtr)
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.0.as_ptr()
    }
}

/// A device-typed raw memory region, the unit an allocator hands out.
pub enum RawBlock {
    Host(HostPtr),
    Wgpu {
        buffer: Arc<wgpu::Buffer>,
        context: Arc<WgpuContext>,
    },
}

impl RawBlock {
    pub fn device(&self) -> Device {
        match self {
            RawBlock::Host(_) => Device::Cpu,
            RawBlock::Wgpu { .. } => Device::Wgpu,
        }
    }
}

/// Allocation strategy for one device kind.
///
/// `allocate` fails fatally (process abort with diagnostic) when the device
/// cannot satisfy the request; the engine cannot proceed without its working
/// buffers, so allocation failure is never surfaced as a recoverable error.
pub trait DeviceAllocator: Send + Sync {
    fn device(&self) -> Device;

    /// Allocates `byte_size` bytes on this device. Fatal on failure.
    fn allocate(&self, byte_size: usize) -> RawBlock;

    /// Releases a block previously returned by `allocate`. Idempotence is
    /// the caller's concern; `Buffer` guarantees exactly-once release.
    fn release(&self, block: &RawBlock, byte_size: usize);

    /// Zero-fills the block.
    fn zero(&self, block: &RawBlock, byte_size: usize);
}
