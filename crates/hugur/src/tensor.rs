//! Typed, shaped view over one [`Buffer`].
//!
//! Tensors add element type and shape on top of the buffer's raw bytes and
//! are what layers bind as inputs and outputs. Cloning a tensor shares the
//! underlying buffer.

use std::sync::Arc;

use ndarray::Array2;

use crate::alloc::DeviceAllocator;
use crate::buffer::Buffer;
use crate::device::Device;
use crate::dtype::DType;
use crate::error::{HugurError, Result};

#[derive(Clone, Debug)]
pub struct Tensor {
    shape: Vec<usize>,
    dtype: DType,
    buffer: Buffer,
}

impl Tensor {
    /// Allocates a zero-filled tensor on the allocator's device.
    pub fn zeros(
        shape: &[usize],
        dtype: DType,
        allocator: Arc<dyn DeviceAllocator>,
    ) -> Result<Tensor> {
        let numel: usize = shape.iter().product();
        let buffer = Buffer::new(dtype.bytes_for(numel), allocator)?;
        buffer.zero();
        Ok(Tensor {
            shape: shape.to_vec(),
            dtype,
            buffer,
        })
    }

    /// Allocates an f32 tensor and copies `data` into it (either device).
    pub fn from_f32(
        shape: &[usize],
        data: &[f32],
        allocator: Arc<dyn DeviceAllocator>,
    ) -> Result<Tensor> {
        let numel: usize = shape.iter().product();
        if numel != data.len() {
            return Err(HugurError::InvalidArgument(format!(
                "shape {shape:?} wants {numel} elements, data has {}",
                data.len()
            )));
        }
        let tensor = Tensor::zeros(shape, DType::F32, allocator)?;
        let staging = unsafe {
            Buffer::from_host_ptr(data.as_ptr() as *mut u8, DType::F32.bytes_for(numel))
        }?;
        tensor.buffer.copy_from(&staging)?;
        Ok(tensor)
    }

    /// Allocates an i32 tensor and copies `data` into it.
    pub fn from_i32(
        shape: &[usize],
        data: &[i32],
        allocator: Arc<dyn DeviceAllocator>,
    ) -> Result<Tensor> {
        let numel: usize = shape.iter().product();
        if numel != data.len() {
            return Err(HugurError::InvalidArgument(format!(
                "shape {shape:?} wants {numel} elements, data has {}",
                data.len()
            )));
        }
        let tensor = Tensor::zeros(shape, DType::I32, allocator)?;
        let staging = unsafe {
            Buffer::from_host_ptr(data.as_ptr() as *mut u8, DType::I32.bytes_for(numel))
        }?;
        tensor.buffer.copy_from(&staging)?;
        Ok(tensor)
    }

    /// Uploads a 2-D ndarray, preserving its shape.
    pub fn from_array2(arr: &Array2<f32>, allocator: Arc<dyn DeviceAllocator>) -> Result<Tensor> {
        let view = arr.as_standard_layout();
        let slice = view.as_slice().ok_or_else(|| {
            HugurError::InternalError("standard-layout array has no contiguous slice".into())
        })?;
        Tensor::from_f32(&[arr.nrows(), arr.ncols()], slice, allocator)
    }

    /// Views an existing buffer as a tensor. The buffer's byte size must
    /// match the shape and dtype exactly.
    pub fn from_buffer(shape: &[usize], dtype: DType, buffer: Buffer) -> Result<Tensor> {
        let numel: usize = shape.iter().product();
        let wanted = dtype.bytes_for(numel);
        if buffer.byte_size() != wanted {
            return Err(HugurError::InvalidArgument(format!(
                "shape {shape:?} of {dtype} wants {wanted} bytes, buffer holds {}",
                buffer.byte_size()
            )));
        }
        Ok(Tensor {
            shape: shape.to_vec(),
            dtype,
            buffer,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn byte_size(&self) -> usize {
        self.buffer.byte_size()
    }

    pub fn device(&self) -> Device {
        self.buffer.device()
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Reads the contents back as f32, from either device.
    pub fn to_vec_f32(&self) -> Result<Vec<f32>> {
        if self.dtype != DType::F32 {
            return Err(HugurError::InvalidArgument(format!(
                "to_vec_f32 on a {} tensor",
                self.dtype
            )));
        }
        Ok(bytemuck::cast_slice(&self.raw_bytes()?).to_vec())
    }

    /// Reads the contents back as i32, from either device.
    pub fn to_vec_i32(&self) -> Result<Vec<i32>> {
        if self.dtype != DType::I32 {
            return Err(HugurError::InvalidArgument(format!(
                "to_vec_i32 on a {} tensor",
                self.dtype
            )));
        }
        Ok(bytemuck::cast_slice(&self.raw_bytes()?).to_vec())
    }

    fn raw_bytes(&self) -> Result<Vec<u8>> {
        match (self.buffer.host_ptr(), self.buffer.wgpu_parts()) {
            (Some(ptr), _) => {
                // Safety: the buffer is live for byte_size bytes.
                Ok(unsafe { std::slice::from_raw_parts(ptr, self.byte_size()) }.to_vec())
            }
            (None, Some((buffer, context))) => context.read_buffer(buffer, self.byte_size()),
            (None, None) => unreachable!("buffer is always host or device backed"),
        }
    }

    /// Host view of an f32 tensor. Kernels use this after the owning layer
    /// has validated device placement.
    pub(crate) fn host_f32(&self) -> Result<&[f32]> {
        let ptr = self.host_ptr()?;
        // Safety: host allocations are 32-byte aligned and live for numel
        // f32 values; the layer validated dtype and device.
        Ok(unsafe { std::slice::from_raw_parts(ptr as *const f32, self.numel()) })
    }

    /// Mutable host view of an f32 tensor.
    ///
    /// The runtime's shared-memory contract applies: callers must not hold
    /// two overlapping mutable views at once.
    #[allow(clippy::mut_from_ref)]
    pub(crate) fn host_f32_mut(&self) -> Result<&mut [f32]> {
        let ptr = self.host_ptr()?;
        // Safety: as above; exclusivity is the caller's contract.
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr as *mut f32, self.numel()) })
    }

    /// Host view of an i32 tensor.
    pub(crate) fn host_i32(&self) -> Result<&[i32]> {
        let ptr = self.host_ptr()?;
        // Safety: as above.
        Ok(unsafe { std::slice::from_raw_parts(ptr as *const i32, self.numel()) })
    }

    /// Host view of an i8 tensor.
    pub(crate) fn host_i8(&self) -> Result<&[i8]> {
        let ptr = self.host_ptr()?;
        // Safety: as above.
        Ok(unsafe { std::slice::from_raw_parts(ptr as *const i8, self.numel()) })
    }

    fn host_ptr(&self) -> Result<*mut u8> {
        self.buffer.host_ptr().ok_or_else(|| {
            HugurError::InternalError("host view requested for an accelerator tensor".into())
        })
    }
}
