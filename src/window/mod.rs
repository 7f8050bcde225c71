//! Iteration windows: per-axis `[start, end)` ranges with a step.

pub mod execute;
pub mod iterator;

pub use execute::execute_window_loop;
pub use iterator::WindowIterator;

use crate::tensor::{TensorInfo, MAX_DIMS};
use std::fmt;
use std::ops::Index;

pub const DIM_X: usize = 0;
pub const DIM_Y: usize = 1;
pub const DIM_Z: usize = 2;
pub const DIM_W: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimension {
    start: usize,
    end: usize,
    step: usize,
}

impl Default for Dimension {
    fn default() -> Self { Self { start: 0, end: 1, step: 1 } }
}

impl Dimension {
    pub fn new(start: usize, end: usize, step: usize) -> Self {
        assert!(start <= end, "dimension start {} past end {}", start, end);
        assert!(step > 0, "dimension step must be positive");
        Self { start, end, step }
    }

    #[inline]
    pub fn start(&self) -> usize { self.start }
    #[inline]
    pub fn end(&self) -> usize { self.end }
    #[inline]
    pub fn step(&self) -> usize { self.step }

    #[inline]
    pub fn num_iterations(&self) -> usize { (self.end - self.start).div_ceil(self.step) }
}

/// Iteration space over up to `MAX_DIMS` axes. Axes that are not iterated
/// hold `Dimension { 0, 1, 1 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Window {
    dims: [Dimension; MAX_DIMS],
}

impl Index<usize> for Window {
    type Output = Dimension;
    fn index(&self, axis: usize) -> &Dimension { &self.dims[axis] }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 { write!(f, ", ")?; }
            write!(f, "{}..{}:{}", d.start, d.end, d.step)?;
        }
        write!(f, "]")
    }
}

impl Window {
    pub fn set(&mut self, axis: usize, dim: Dimension) -> &mut Self {
        self.dims[axis] = dim;
        self
    }

    #[inline]
    pub fn x(&self) -> &Dimension { &self.dims[DIM_X] }
    #[inline]
    pub fn y(&self) -> &Dimension { &self.dims[DIM_Y] }

    pub fn num_iterations(&self, axis: usize) -> usize { self.dims[axis].num_iterations() }

    pub fn num_iterations_total(&self) -> usize {
        self.dims.iter().map(Dimension::num_iterations).product()
    }

    /// True when some axis enumerates no positions.
    pub fn is_empty(&self) -> bool { self.dims.iter().any(|d| d.num_iterations() == 0) }

    /// Merge axes `first..MAX_DIMS` into `first`, when every merged axis (and,
    /// if any of them has extent > 1, `first` itself) spans the full range of
    /// `full` with step 1. Returns `self` unchanged otherwise.
    pub fn collapse_if_possible(&self, full: &Window, first: usize) -> Window {
        if first + 1 >= MAX_DIMS { return *self; }
        let spans_full = |d: usize| {
            let (w, f) = (self.dims[d], full.dims[d]);
            w.start == 0 && f.start == 0 && w.step == 1 && w.end == f.end
        };
        if !(first + 1..MAX_DIMS).all(spans_full) { return *self; }
        let merged: usize = (first + 1..MAX_DIMS).map(|d| self.dims[d].end).product();
        if merged == 1 || !spans_full(first) { return *self; }

        let mut collapsed = *self;
        collapsed.dims[first] = Dimension::new(0, self.dims[first].end * merged, 1);
        for d in first + 1..MAX_DIMS { collapsed.dims[d] = Dimension::default(); }
        collapsed
    }

    /// Part `id` of `total` balanced slices along `axis`; the first
    /// `iterations % total` slices get one extra iteration.
    pub fn split_window(&self, axis: usize, id: usize, total: usize) -> Window {
        assert!(total > 0 && id < total, "split {} of {}", id, total);
        let d = self.dims[axis];
        let num_it = d.num_iterations();
        let rem = num_it % total;
        let mut work = num_it / total;
        let mut it_start = work * id;
        if id < rem {
            work += 1;
            it_start += id;
        } else {
            it_start += rem;
        }
        let start = (d.start + it_start * d.step).min(d.end);
        let end = d.end.min(start + work * d.step);
        let mut out = *self;
        out.dims[axis] = Dimension::new(start, end, d.step);
        out
    }

    /// Whether `sub` lies inside `self` with matching steps.
    pub fn is_valid_subwindow(&self, sub: &Window) -> bool {
        self.dims.iter().zip(sub.dims.iter()).all(|(full, w)| {
            w.start >= full.start && w.end <= full.end && w.step == full.step
        })
    }

    /// Whether both windows enumerate at least one common coordinate range.
    pub fn intersects(&self, other: &Window) -> bool {
        if self.is_empty() || other.is_empty() { return false; }
        self.dims.iter().zip(other.dims.iter()).all(|(a, b)| a.start < b.end && b.start < a.end)
    }
}

/// Step-1 window covering every element of `info`.
pub fn calculate_max_window(info: &TensorInfo) -> Window {
    let mut win = Window::default();
    for axis in 0..info.num_dimensions() {
        win.set(axis, Dimension::new(0, info.dimension(axis), 1));
    }
    if info.num_dimensions() == 0 {
        // Unset shape: no elements, so no positions.
        win.set(DIM_X, Dimension::new(0, 0, 1));
    }
    win
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{DataType, TensorShape};

    fn max_window(dims: &[usize]) -> Window {
        calculate_max_window(&TensorInfo::new(TensorShape::new(dims), DataType::S32))
    }

    #[test]
    fn collapse_merges_full_outer_axes() {
        let full = max_window(&[5, 3, 4, 2]);
        let c = full.collapse_if_possible(&full, DIM_Z);
        assert_eq!(c[DIM_Z], Dimension::new(0, 8, 1));
        assert_eq!(c[DIM_W], Dimension::default());
        assert_eq!(c.num_iterations_total(), full.num_iterations_total());
    }

    #[test]
    fn collapse_keeps_partial_windows() {
        let full = max_window(&[5, 3, 4, 2]);
        let part = full.split_window(DIM_W, 0, 2);
        assert_eq!(part.collapse_if_possible(&full, DIM_Z), part);
        let part_z = full.split_window(DIM_Z, 1, 2);
        assert_eq!(part_z.collapse_if_possible(&full, DIM_Z), part_z);
    }

    #[test]
    fn split_distributes_remainder_first() {
        let full = max_window(&[4, 7]);
        let parts: Vec<_> = (0..3).map(|i| full.split_window(DIM_Y, i, 3)).collect();
        assert_eq!(parts[0].y(), &Dimension::new(0, 3, 1));
        assert_eq!(parts[1].y(), &Dimension::new(3, 5, 1));
        assert_eq!(parts[2].y(), &Dimension::new(5, 7, 1));
        assert!(parts.iter().all(|p| full.is_valid_subwindow(p)));
        assert!(!parts[0].intersects(&parts[1]));
    }

    #[test]
    fn split_with_more_parts_than_iterations_yields_empty_tail() {
        let full = max_window(&[4, 2]);
        let last = full.split_window(DIM_Y, 3, 4);
        assert!(last.is_empty());
        assert!(full.is_valid_subwindow(&last));
    }

    #[test]
    fn max_window_covers_exactly_the_elements() {
        let shapes: [&[usize]; 4] = [&[5, 3, 4, 2], &[0, 4], &[7], &[]];
        for dims in shapes {
            let info = TensorInfo::new(TensorShape::new(dims), DataType::S32);
            let win = calculate_max_window(&info);
            assert_eq!(win.num_iterations_total(), info.tensor_shape().total_size(), "dims {:?}", dims);
        }
        assert!(calculate_max_window(&TensorInfo::default()).is_empty());
    }

    #[test]
    fn subwindow_must_stay_inside() {
        let full = max_window(&[4, 2]);
        let mut outside = full;
        outside.set(DIM_Y, Dimension::new(1, 3, 1));
        assert!(!full.is_valid_subwindow(&outside));
        let mut stepped = full;
        stepped.set(DIM_X, Dimension::new(0, 4, 2));
        assert!(!full.is_valid_subwindow(&stepped));
    }
}
