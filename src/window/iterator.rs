use super::Window;
use crate::tensor::{TensorView, MAX_DIMS};
use std::cell::Cell;

#[derive(Debug, Default)]
struct IterDim {
    stride: usize,
    start: Cell<usize>,
}

/// Byte cursor over a tensor, driven by `execute_window_loop`.
///
/// Each axis advances by `step * stride_in_bytes`; an axis past the tensor's
/// rank has stride 0, so a lower-rank operand (a 1-D bias) stays put on it and
/// is broadcast. Offsets live in `Cell`s so the loop driver can advance the
/// iterator while the per-position action reads through it.
#[derive(Debug)]
pub struct WindowIterator<'a> {
    view: TensorView<'a>,
    dims: [IterDim; MAX_DIMS],
}

impl<'a> WindowIterator<'a> {
    pub fn new(view: TensorView<'a>, window: &Window) -> Self {
        let strides = view.info().strides_in_bytes();
        let offset: usize = (0..MAX_DIMS).map(|d| window[d].start() * strides[d]).sum();
        let dims = std::array::from_fn(|d| IterDim {
            stride: window[d].step() * strides[d],
            start: Cell::new(offset),
        });
        Self { view, dims }
    }

    /// Byte offset of the current position.
    #[inline]
    pub fn offset(&self) -> usize { self.dims[0].start.get() }

    /// Move one step along `dim` and rewind every inner axis to the new start.
    #[inline]
    pub fn increment(&self, dim: usize) {
        let next = self.dims[dim].start.get() + self.dims[dim].stride;
        for d in &self.dims[..=dim] {
            d.start.set(next);
        }
    }

    #[inline]
    fn byte_offset<T>(&self, index: usize) -> usize {
        self.offset() + index * std::mem::size_of::<T>()
    }

    /// Element `index` along the innermost axis, counted from the current row.
    pub fn read_s32(&self, index: usize) -> i32 {
        let off = self.byte_offset::<i32>(index);
        assert!(off + 4 <= self.view.len(), "read at byte {} past buffer of {}", off, self.view.len());
        // SAFETY: bounds checked above; unaligned read.
        unsafe { self.view.as_ptr().as_ptr().add(off).cast::<i32>().read_unaligned() }
    }

    /// `N` consecutive i32 starting at element `index` of the current row.
    ///
    /// The kernel checks the window's extent against the buffer before
    /// iterating; re-checked here in debug builds.
    #[inline]
    pub(crate) fn load_s32<const N: usize>(&self, index: usize) -> [i32; N] {
        let off = self.byte_offset::<i32>(index);
        debug_assert!(off + 4 * N <= self.view.len(), "load at byte {} past buffer of {}", off, self.view.len());
        // SAFETY: in-bounds per caller contract; unaligned read.
        unsafe { self.view.as_ptr().as_ptr().add(off).cast::<[i32; N]>().read_unaligned() }
    }

    /// Store `N` bytes at element `index` of the current row.
    ///
    /// Caller guarantees the range is inside the buffer and that no other
    /// thread writes the same bytes.
    #[inline]
    pub(crate) fn store_u8<const N: usize>(&self, index: usize, values: [u8; N]) {
        let off = self.byte_offset::<u8>(index);
        debug_assert!(self.view.is_writable(), "store through read-only view");
        debug_assert!(off + N <= self.view.len(), "store at byte {} past buffer of {}", off, self.view.len());
        // SAFETY: in-bounds and exclusive per caller contract.
        unsafe { self.view.as_ptr().as_ptr().add(off).cast::<[u8; N]>().write_unaligned(values) }
    }
}
