use super::{DataType, TensorInfo, TensorShape, TensorView};
use std::ptr::NonNull;
use crate::error::{Error, Result};

/// Descriptor plus a caller-owned byte buffer. Kernels never allocate or resize
/// it; they only borrow it for the duration of a run.
#[derive(Debug, Clone, Default)]
pub struct Tensor {
    info: TensorInfo,
    buffer: Vec<u8>,
}

impl Tensor {
    /// Unallocated tensor with the given descriptor.
    pub fn new(info: TensorInfo) -> Self { Self { info, buffer: Vec::new() } }

    /// Zero-filled storage sized from the current descriptor.
    pub fn allocate(&mut self) {
        self.buffer = vec![0u8; self.info.total_size()];
    }

    pub fn info(&self) -> &TensorInfo { &self.info }
    pub fn info_mut(&mut self) -> &mut TensorInfo { &mut self.info }

    /// Allocated S32 tensor holding `values` in axis-0-fastest order.
    pub fn from_s32(shape: TensorShape, values: &[i32]) -> Result<Self> {
        if shape.total_size() != values.len() {
            return Err(Error::ShapeMismatch(format!(
                "shape {} needs {} elements, got {}", shape, shape.total_size(), values.len()
            )));
        }
        let mut buffer = Vec::with_capacity(values.len() * 4);
        for v in values { buffer.extend_from_slice(&v.to_ne_bytes()); }
        Ok(Self { info: TensorInfo::new(shape, DataType::S32), buffer })
    }

    pub fn to_s32_vec(&self) -> Vec<i32> {
        self.buffer.chunks_exact(4).map(|b| i32::from_ne_bytes([b[0], b[1], b[2], b[3]])).collect()
    }

    pub fn to_u8_vec(&self) -> Vec<u8> { self.buffer.clone() }

    /// Read-only view for iteration.
    pub fn view(&self) -> TensorView<'_> {
        let ptr = NonNull::new(self.buffer.as_ptr() as *mut u8).unwrap_or(NonNull::dangling());
        TensorView::new(ptr, self.buffer.len(), &self.info, false)
    }

    pub(crate) fn view_mut(&mut self) -> TensorView<'_> {
        let ptr = NonNull::new(self.buffer.as_mut_ptr()).unwrap_or(NonNull::dangling());
        TensorView::new(ptr, self.buffer.len(), &self.info, true)
    }
}
