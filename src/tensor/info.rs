use super::{Coordinates, DataType, Strides, TensorShape, ValidRegion, MAX_DIMS};

/// Tensor descriptor: shape, element type, dense byte strides and valid region.
///
/// Strides are always dense (no padding), so memory is contiguous across any
/// run of axes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TensorInfo {
    shape: TensorShape,
    data_type: DataType,
    strides: Strides,
    valid_region: ValidRegion,
}

impl TensorInfo {
    pub fn new(shape: TensorShape, data_type: DataType) -> Self {
        let mut info = Self { shape, data_type, strides: Strides::default(), valid_region: ValidRegion::full(shape) };
        info.update_strides();
        info
    }

    fn update_strides(&mut self) {
        let mut strides = [0usize; MAX_DIMS];
        let mut stride = self.data_type.element_size();
        for (axis, s) in strides.iter_mut().enumerate().take(self.shape.num_dimensions()) {
            *s = stride;
            stride *= self.shape.dim(axis);
        }
        self.strides = Strides(strides);
    }

    #[inline]
    pub fn tensor_shape(&self) -> &TensorShape { &self.shape }
    #[inline]
    pub fn data_type(&self) -> DataType { self.data_type }
    #[inline]
    pub fn strides_in_bytes(&self) -> &Strides { &self.strides }
    #[inline]
    pub fn valid_region(&self) -> &ValidRegion { &self.valid_region }
    #[inline]
    pub fn num_dimensions(&self) -> usize { self.shape.num_dimensions() }
    #[inline]
    pub fn dimension(&self, axis: usize) -> usize { self.shape.dim(axis) }
    #[inline]
    pub fn element_size(&self) -> usize { self.data_type.element_size() }

    /// Size of the tensor in bytes; zero means "not initialized yet".
    pub fn total_size(&self) -> usize { self.shape.total_size() * self.element_size() }

    pub fn set_data_type(&mut self, data_type: DataType) -> &mut Self {
        self.data_type = data_type;
        self.update_strides();
        self
    }

    pub fn set_tensor_shape(&mut self, shape: TensorShape) -> &mut Self {
        self.shape = shape;
        self.update_strides();
        self.valid_region = ValidRegion::full(shape);
        self
    }

    pub fn set_valid_region(&mut self, region: ValidRegion) -> &mut Self {
        self.valid_region = region;
        self
    }

    /// Byte offset of the element at `coords`.
    #[inline]
    pub fn offset_element_in_bytes(&self, coords: &Coordinates) -> usize {
        (0..MAX_DIMS).map(|axis| coords[axis] * self.strides[axis]).sum()
    }
}

/// Initialize `info` with `shape` and `data_type` if its size in bytes is
/// zero, which includes a shaped descriptor of `Unknown` type. Returns whether
/// anything was changed.
pub fn auto_init_if_empty(info: &mut TensorInfo, shape: TensorShape, data_type: DataType) -> bool {
    if info.total_size() == 0 {
        info.set_data_type(data_type).set_tensor_shape(shape);
        return true;
    }
    false
}
