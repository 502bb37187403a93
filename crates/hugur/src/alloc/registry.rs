//! Process-wide allocator registry.
//!
//! One allocator instance per device kind, constructed lazily on first
//! request and retained for the process lifetime. Instances are immutable
//! after initialization and safely shared across threads without locking.
//! Buffers hold the allocator by handle rather than reaching for ambient
//! globals, which keeps the core testable with substitute allocators.

use std::sync::{Arc, OnceLock};

use crate::alloc::{CpuAllocator, DeviceAllocator, WgpuAllocator};
use crate::device::Device;
use crate::error::HugurError;
use crate::fatal;
use crate::gpu::WgpuContext;

static REGISTRY: OnceLock<AllocatorRegistry> = OnceLock::new();

/// Table mapping a device kind to its process-wide allocator.
pub struct AllocatorRegistry {
    cpu: Arc<CpuAllocator>,
    wgpu: OnceLock<Arc<WgpuAllocator>>,
}

impl AllocatorRegistry {
    pub fn global() -> &'static AllocatorRegistry {
        REGISTRY.get_or_init(|| AllocatorRegistry {
            cpu: Arc::new(CpuAllocator),
            wgpu: OnceLock::new(),
        })
    }

    /// Returns the allocator for `device`, constructing it on first use.
    ///
    /// Requesting the accelerator on a machine with no usable adapter is a
    /// fatal misconfiguration, not a recoverable error; probe with
    /// [`WgpuContext::is_available`] first when the device is optional.
    pub fn get(&self, device: Device) -> Arc<dyn DeviceAllocator> {
        match device {
            Device::Cpu => self.cpu.clone(),
            Device::Wgpu => self
                .wgpu
                .get_or_init(|| {
                    let context = WgpuContext::create().unwrap_or_else(|err| {
                        fatal!(HugurError::InternalError(format!(
                            "no accelerator available: {err}"
                        )))
                    });
                    Arc::new(WgpuAllocator::new(context))
                })
                .clone(),
        }
    }
}

/// Convenience lookup against the global registry.
pub fn allocator_for(device: Device) -> Arc<dyn DeviceAllocator> {
    AllocatorRegistry::global().get(device)
}
