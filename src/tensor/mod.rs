//! Tensor metadata (shape, data type, strides, valid region) and a plain
//! owned buffer for callers. Axis 0 is the fastest-varying axis.

pub mod info;
pub mod storage;
pub mod view;

pub use info::{auto_init_if_empty, TensorInfo};
pub use storage::Tensor;
pub use view::TensorView;

use std::fmt;
use std::ops::{Index, IndexMut};

/// Highest tensor rank handled by windows and iterators.
pub const MAX_DIMS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    #[default]
    Unknown,
    U8,
    S8,
    S16,
    S32,
    F32,
}

impl DataType {
    pub fn element_size(self) -> usize {
        match self {
            DataType::Unknown => 0,
            DataType::U8 | DataType::S8 => 1,
            DataType::S16 => 2,
            DataType::S32 | DataType::F32 => 4,
        }
    }
}

/// Per-axis extents. Unset axes read as 1; trailing extent-1 axes do not count
/// towards `num_dimensions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorShape {
    dims: [usize; MAX_DIMS],
    num_dimensions: usize,
}

impl Default for TensorShape {
    fn default() -> Self { Self { dims: [1; MAX_DIMS], num_dimensions: 0 } }
}

impl TensorShape {
    pub fn new(dims: &[usize]) -> Self {
        assert!(dims.len() <= MAX_DIMS, "tensor rank {} exceeds {}", dims.len(), MAX_DIMS);
        let mut shape = Self::default();
        shape.dims[..dims.len()].copy_from_slice(dims);
        shape.num_dimensions = dims.len();
        shape.correct_num_dimensions();
        shape
    }

    pub fn set(&mut self, axis: usize, extent: usize) -> &mut Self {
        assert!(axis < MAX_DIMS, "axis {} out of range", axis);
        self.dims[axis] = extent;
        self.num_dimensions = self.num_dimensions.max(axis + 1);
        self.correct_num_dimensions();
        self
    }

    fn correct_num_dimensions(&mut self) {
        while self.num_dimensions > 1 && self.dims[self.num_dimensions - 1] == 1 {
            self.num_dimensions -= 1;
        }
    }

    #[inline]
    pub fn dim(&self, axis: usize) -> usize { self.dims[axis] }

    #[inline]
    pub fn num_dimensions(&self) -> usize { self.num_dimensions }

    /// Extents of the counted axes.
    pub fn dims(&self) -> &[usize] { &self.dims[..self.num_dimensions] }

    /// Number of elements; zero for a shape that was never set.
    pub fn total_size(&self) -> usize {
        if self.num_dimensions == 0 { 0 } else { self.dims.iter().product() }
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.dims().iter().enumerate() {
            if i > 0 { write!(f, ",")?; }
            write!(f, "{}", d)?;
        }
        write!(f, ")")
    }
}

/// Byte strides per axis. Axes past the tensor's rank have stride 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Strides(pub [usize; MAX_DIMS]);

impl Index<usize> for Strides {
    type Output = usize;
    fn index(&self, axis: usize) -> &usize { &self.0[axis] }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Coordinates(pub [usize; MAX_DIMS]);

impl Index<usize> for Coordinates {
    type Output = usize;
    fn index(&self, axis: usize) -> &usize { &self.0[axis] }
}

impl IndexMut<usize> for Coordinates {
    fn index_mut(&mut self, axis: usize) -> &mut usize { &mut self.0[axis] }
}

/// Sub-rectangle of a tensor holding meaningful data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidRegion {
    pub anchor: Coordinates,
    pub shape: TensorShape,
}

impl ValidRegion {
    pub fn full(shape: TensorShape) -> Self { Self { anchor: Coordinates::default(), shape } }
}
