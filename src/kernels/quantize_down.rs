use super::{Kernel, TensorPack, ThreadInfo};
use crate::error::{return_error_on, Status};
use crate::quantize::{add_x16, finalize_quantization, finalize_quantization_x16, ClampPolicy, FixedPoint, VECTOR_WIDTH};
use crate::tensor::{auto_init_if_empty, Coordinates, DataType, TensorInfo, TensorView, ValidRegion};
use crate::window::{calculate_max_window, execute_window_loop, Dimension, Window, WindowIterator, DIM_X, DIM_Z};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-point parameters of the int32 → uint8 requantization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantizeDownParams {
    /// Q31 multiplier.
    pub multiplier: i32,
    /// Right shift applied after the multiply, `0..=31`.
    pub shift: i32,
    /// Added after the shift.
    pub offset: i32,
    pub min: i32,
    pub max: i32,
}

impl Default for QuantizeDownParams {
    fn default() -> Self { Self { multiplier: 1 << 30, shift: 0, offset: 0, min: 0, max: 255 } }
}

impl QuantizeDownParams {
    pub fn fixed_point(&self) -> FixedPoint {
        FixedPoint { multiplier: self.multiplier, shift: self.shift, offset: self.offset }
    }
}

/// Requantizes one row segment `[start_x, end_x)`: 16-wide steps, then a
/// scalar tail. Monomorphized over the clamp variant.
type RowFn = fn(&FixedPoint, (u8, u8), &WindowIterator<'_>, Option<&WindowIterator<'_>>, &WindowIterator<'_>, usize, usize);

fn quantize_row<const BOUNDED: bool>(
    fp: &FixedPoint,
    (min, max): (u8, u8),
    input: &WindowIterator<'_>,
    bias: Option<&WindowIterator<'_>>,
    output: &WindowIterator<'_>,
    start_x: usize,
    end_x: usize,
) {
    let mut x = start_x;
    while x + VECTOR_WIDTH <= end_x {
        let mut acc = input.load_s32::<VECTOR_WIDTH>(x);
        if let Some(b) = bias {
            acc = add_x16(acc, b.load_s32::<VECTOR_WIDTH>(x));
        }
        output.store_u8(x, finalize_quantization_x16::<BOUNDED>(acc, fp, min, max));
        x += VECTOR_WIDTH;
    }
    while x < end_x {
        let mut acc = input.load_s32::<1>(x)[0];
        if let Some(b) = bias {
            acc = acc.wrapping_add(b.load_s32::<1>(x)[0]);
        }
        output.store_u8(x, [finalize_quantization::<BOUNDED>(acc, fp, min, max)]);
        x += 1;
    }
}

#[derive(Clone)]
struct Configured {
    input: TensorInfo,
    bias: Option<TensorInfo>,
    output: TensorInfo,
    params: QuantizeDownParams,
    policy: ClampPolicy,
    row_fn: RowFn,
    window: Window,
}

impl fmt::Debug for Configured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configured")
            .field("input", &self.input)
            .field("bias", &self.bias)
            .field("output", &self.output)
            .field("params", &self.params)
            .field("policy", &self.policy)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

/// Requantizes S32 GEMM accumulators to U8:
/// `clamp(round_shift(qrdmulh(acc + bias, multiplier), shift) + offset)`.
#[derive(Debug, Clone, Default)]
pub struct QuantizeDownKernel {
    config: Option<Configured>,
}

fn validate_arguments(input: &TensorInfo, bias: Option<&TensorInfo>, output: &TensorInfo, min: i32, max: i32) -> Status {
    return_error_on!(input.data_type() != DataType::S32, InvalidDataType, "input must be S32, got {:?}", input.data_type());
    return_error_on!(max > 255, InvalidArgument, "max {} exceeds 255", max);
    return_error_on!(min < 0 || min > max, InvalidArgument, "min {} not in [0, max {}]", min, max);

    if let Some(bias) = bias {
        return_error_on!(bias.data_type() != input.data_type(), ShapeMismatch,
            "bias type {:?} differs from input type {:?}", bias.data_type(), input.data_type());
        return_error_on!(bias.num_dimensions() > 1, ShapeMismatch, "bias must be 1-D, got {}", bias.tensor_shape());
        return_error_on!(bias.dimension(0) != input.dimension(0), ShapeMismatch,
            "bias length {} differs from input width {}", bias.dimension(0), input.dimension(0));
    }

    if output.total_size() != 0 {
        return_error_on!(output.data_type() != DataType::U8, InvalidDataType, "output must be U8, got {:?}", output.data_type());
        return_error_on!(output.tensor_shape() != input.tensor_shape(), ShapeMismatch,
            "output shape {} differs from input shape {}", output.tensor_shape(), input.tensor_shape());
    }
    Ok(())
}

/// Auto-initializes `output` from `input` and returns the kernel window.
fn configure_window(input: &TensorInfo, output: &mut TensorInfo) -> Window {
    auto_init_if_empty(output, *input.tensor_shape(), DataType::U8);
    let win = calculate_max_window(input);
    let full = ValidRegion::full(*output.tensor_shape());
    output.set_valid_region(full);
    win
}

fn check_binding(role: &str, view: &TensorView<'_>, expected: &TensorInfo) {
    let info = view.info();
    if info.tensor_shape() != expected.tensor_shape() || info.data_type() != expected.data_type() {
        panic!(
            "PreconditionViolation: {} tensor is {} {:?}, configured for {} {:?}",
            role, info.tensor_shape(), info.data_type(), expected.tensor_shape(), expected.data_type()
        );
    }
    if view.len() < expected.total_size() {
        panic!("PreconditionViolation: {} buffer holds {} bytes, needs {}", role, view.len(), expected.total_size());
    }
}

/// Panics unless `view` holds every byte `window` reaches with elements of
/// `elem_size` bytes. Loads and stores in `run` rely on this.
fn check_extent(role: &str, view: &TensorView<'_>, window: &Window, elem_size: usize) {
    let info = view.info();
    if info.element_size() != elem_size {
        panic!("PreconditionViolation: {} elements are {} bytes, kernel accesses {}", role, info.element_size(), elem_size);
    }
    if window.is_empty() { return; }
    let last = Coordinates(std::array::from_fn(|d| {
        let dim = window[d];
        dim.start() + (dim.num_iterations() - 1) * dim.step()
    }));
    let end = info.offset_element_in_bytes(&last) + elem_size;
    if end > view.len() {
        panic!("PreconditionViolation: {} window {} reaches byte {}, buffer holds {}", role, window, end, view.len());
    }
}

impl QuantizeDownKernel {
    pub const NAME: &'static str = "QuantizeDownInt32ToUint8ScaleByFixedPoint";

    pub fn new() -> Self { Self::default() }

    pub fn is_configured(&self) -> bool { self.config.is_some() }

    /// Clamp variant chosen by `configure`.
    pub fn policy(&self) -> Option<ClampPolicy> { self.config.as_ref().map(|c| c.policy) }

    /// Check a configuration without touching any tensor.
    pub fn validate(input: &TensorInfo, bias: Option<&TensorInfo>, output: &TensorInfo, min: i32, max: i32) -> Status {
        validate_arguments(input, bias, output, min, max)?;
        let mut output = output.clone();
        configure_window(input, &mut output);
        Ok(())
    }

    /// Validate, auto-initialize an empty `output` descriptor, and fix the
    /// window, parameters and clamp variant. On error the kernel is left
    /// unconfigured and `output` untouched.
    pub fn configure(&mut self, input: &TensorInfo, bias: Option<&TensorInfo>, output: &mut TensorInfo, params: QuantizeDownParams) -> Status {
        self.config = None;
        validate_arguments(input, bias, output, params.min, params.max)?;
        return_error_on!(!(0..=31).contains(&params.shift), InvalidArgument, "shift {} not in [0, 31]", params.shift);

        let window = configure_window(input, output);
        let policy = ClampPolicy::select(params.min, params.max);
        let row_fn: RowFn = if policy.is_bounded() { quantize_row::<true> } else { quantize_row::<false> };
        debug!(
            "{}: input {} bias {} window {} policy {:?}",
            Self::NAME, input.tensor_shape(), bias.is_some(), window, policy
        );
        self.config = Some(Configured {
            input: input.clone(),
            bias: bias.cloned(),
            output: output.clone(),
            params,
            policy,
            row_fn,
            window,
        });
        Ok(())
    }
}

impl Kernel for QuantizeDownKernel {
    fn name(&self) -> &'static str { Self::NAME }

    fn window(&self) -> Option<&Window> { self.config.as_ref().map(|c| &c.window) }

    fn run(&self, window: &Window, info: &ThreadInfo, pack: &TensorPack<'_>) {
        let cfg = match &self.config {
            Some(c) => c,
            None => panic!("PreconditionViolation: {} run before configure", Self::NAME),
        };
        if !cfg.window.is_valid_subwindow(window) {
            panic!("PreconditionViolation: window {} is not inside configured window {}", window, cfg.window);
        }
        let src = pack.src().unwrap_or_else(|e| panic!("{}", e));
        let dst = pack.dst().unwrap_or_else(|e| panic!("{}", e));
        check_binding("input", &src, &cfg.input);
        check_binding("output", &dst, &cfg.output);
        check_extent("input", &src, window, 4);
        check_extent("output", &dst, window, 1);
        let bias = match (&cfg.bias, pack.bias()) {
            (Some(expected), Some(view)) => {
                check_binding("bias", &view, expected);
                check_extent("bias", &view, window, 4);
                Some(view)
            }
            (None, None) => None,
            (Some(_), None) => panic!("PreconditionViolation: kernel configured with bias but pack has none"),
            (None, Some(_)) => panic!("PreconditionViolation: pack has a bias the kernel was not configured with"),
        };
        if window.is_empty() { return; }

        let _claim = pack.claim(window);
        trace!("{}: thread {}/{} window {}", Self::NAME, info.thread_id, info.num_threads, window);

        let start_x = window.x().start();
        let end_x = window.x().end();
        let mut win = window.collapse_if_possible(&cfg.window, DIM_Z);
        win.set(DIM_X, Dimension::default());

        let fp = cfg.params.fixed_point();
        let bounds = cfg.policy.bounds();
        let row = cfg.row_fn;
        let input = WindowIterator::new(src, &win);
        let output = WindowIterator::new(dst, &win);
        match bias {
            Some(b) => {
                let bias = WindowIterator::new(b, &win);
                execute_window_loop(&win, &[&input, &output, &bias], |_| {
                    row(&fp, bounds, &input, Some(&bias), &output, start_x, end_x)
                });
            }
            None => {
                execute_window_loop(&win, &[&input, &output], |_| {
                    row(&fp, bounds, &input, None, &output, start_x, end_x)
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{Tensor, TensorShape};

    #[test]
    fn extent_accepts_window_inside_buffer() {
        let t = Tensor::from_s32(TensorShape::new(&[8, 4]), &[0; 32]).unwrap();
        check_extent("input", &t.view(), &calculate_max_window(t.info()), 4);
        let empty = Tensor::from_s32(TensorShape::default(), &[]).unwrap();
        check_extent("input", &empty.view(), &calculate_max_window(empty.info()), 4);
    }

    #[test]
    #[should_panic(expected = "PreconditionViolation")]
    fn extent_rejects_window_past_buffer() {
        let t = Tensor::from_s32(TensorShape::new(&[8, 4]), &[0; 32]).unwrap();
        let larger = TensorInfo::new(TensorShape::new(&[8, 5]), DataType::S32);
        check_extent("input", &t.view(), &calculate_max_window(&larger), 4);
    }

    #[test]
    #[should_panic(expected = "PreconditionViolation")]
    fn extent_rejects_mismatched_element_size() {
        let t = Tensor::new(TensorInfo::new(TensorShape::new(&[4]), DataType::Unknown));
        check_extent("output", &t.view(), &Window::default(), 1);
    }
}
