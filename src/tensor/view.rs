use super::TensorInfo;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Non-owning (base pointer, descriptor, byte length) view of a tensor buffer.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    ptr: NonNull<u8>,
    len: usize,
    info: &'a TensorInfo,
    writable: bool,
    _marker: PhantomData<&'a [u8]>,
}

// SAFETY: a view is either read-only, or writable and reachable only through a
// `TensorPack`, which admits concurrent writers only on disjoint windows.
unsafe impl Send for TensorView<'_> {}
unsafe impl Sync for TensorView<'_> {}

impl<'a> TensorView<'a> {
    pub(super) fn new(ptr: NonNull<u8>, len: usize, info: &'a TensorInfo, writable: bool) -> Self {
        Self { ptr, len, info, writable, _marker: PhantomData }
    }

    #[inline]
    pub fn info(&self) -> &'a TensorInfo { self.info }
    #[inline]
    pub fn len(&self) -> usize { self.len }
    #[inline]
    pub fn is_empty(&self) -> bool { self.len == 0 }
    #[inline]
    pub fn is_writable(&self) -> bool { self.writable }
    #[inline]
    pub(crate) fn as_ptr(&self) -> NonNull<u8> { self.ptr }
}
