use requant::quantize::ClampPolicy;
use requant::tensor::{Coordinates, DataType, Tensor, TensorInfo, TensorShape, ValidRegion};
use requant::window::{Dimension, Window, DIM_Y};
use requant::{Error, Kernel, QuantizeDownKernel, QuantizeDownParams, Scheduler, TensorPack, ThreadInfo};

fn s32(dims: &[usize]) -> Tensor {
    let shape = TensorShape::new(dims);
    let values: Vec<i32> = (0..shape.total_size() as i32).map(|v| v * 1000).collect();
    Tensor::from_s32(shape, &values).unwrap()
}

fn params(min: i32, max: i32) -> QuantizeDownParams {
    QuantizeDownParams { multiplier: 1 << 30, shift: 1, offset: 128, min, max }
}

#[test]
fn configure_auto_initializes_empty_output() {
    let input = s32(&[8, 4]);
    let mut output = TensorInfo::default();
    let mut k = QuantizeDownKernel::new();
    k.configure(input.info(), None, &mut output, params(0, 255)).unwrap();
    assert!(k.is_configured());
    assert_eq!(*output.tensor_shape(), TensorShape::new(&[8, 4]));
    assert_eq!(output.data_type(), DataType::U8);
    assert_eq!(*output.valid_region(), ValidRegion { anchor: Coordinates::default(), shape: TensorShape::new(&[8, 4]) });
    let win = k.window().unwrap();
    assert_eq!(win[0], Dimension::new(0, 8, 1));
    assert_eq!(win[1], Dimension::new(0, 4, 1));
    assert_eq!(win.num_iterations_total(), 32);
}

#[test]
fn failed_configure_leaves_kernel_unconfigured() {
    let input = s32(&[8, 4]);
    let mut output = TensorInfo::default();
    let mut k = QuantizeDownKernel::new();
    assert!(matches!(k.configure(input.info(), None, &mut output, params(10, 5)), Err(Error::InvalidArgument(_))));
    assert!(!k.is_configured());
    assert_eq!(output.total_size(), 0, "output must not be initialized by a failed configure");

    k.configure(input.info(), None, &mut output, params(0, 255)).unwrap();
    let bad_shift = QuantizeDownParams { shift: 32, ..params(0, 255) };
    assert!(matches!(k.configure(input.info(), None, &mut output, bad_shift), Err(Error::InvalidArgument(_))));
    assert!(!k.is_configured());
    assert!(k.window().is_none());
}

#[test]
fn clamp_variant_is_selected_once() {
    let input = s32(&[4]);
    let cases = [
        ((0, 255), ClampPolicy::FullRange),
        ((5, 5), ClampPolicy::FullRange),
        ((0, 100), ClampPolicy::Bounded { min: 0, max: 100 }),
        ((20, 255), ClampPolicy::Bounded { min: 20, max: 255 }),
    ];
    for ((min, max), expected) in cases {
        let mut output = TensorInfo::default();
        let mut k = QuantizeDownKernel::new();
        k.configure(input.info(), None, &mut output, params(min, max)).unwrap();
        assert_eq!(k.policy(), Some(expected), "min {} max {}", min, max);
    }
}

#[test]
#[should_panic(expected = "PreconditionViolation")]
fn run_before_configure_panics() {
    let input = s32(&[8, 4]);
    let mut output = Tensor::new(TensorInfo::new(TensorShape::new(&[8, 4]), DataType::U8));
    output.allocate();
    let pack = TensorPack::new().with_src(&input).with_dst(&mut output);
    QuantizeDownKernel::new().run(&Window::default(), &ThreadInfo::default(), &pack);
}

#[test]
#[should_panic(expected = "PreconditionViolation")]
fn run_outside_configured_window_panics() {
    let input = s32(&[8, 4]);
    let mut output = Tensor::new(TensorInfo::default());
    let mut k = QuantizeDownKernel::new();
    k.configure(input.info(), None, output.info_mut(), params(0, 255)).unwrap();
    output.allocate();
    let pack = TensorPack::new().with_src(&input).with_dst(&mut output);
    let mut win = *k.window().unwrap();
    win.set(DIM_Y, Dimension::new(2, 5, 1));
    k.run(&win, &ThreadInfo::default(), &pack);
}

#[test]
#[should_panic(expected = "NullArgument")]
fn run_without_destination_panics() {
    let input = s32(&[8, 4]);
    let mut output = TensorInfo::default();
    let mut k = QuantizeDownKernel::new();
    k.configure(input.info(), None, &mut output, params(0, 255)).unwrap();
    let pack = TensorPack::new().with_src(&input);
    k.run(k.window().unwrap(), &ThreadInfo::default(), &pack);
}

#[test]
#[should_panic(expected = "PreconditionViolation")]
fn run_with_missing_bias_panics() {
    let input = s32(&[8, 4]);
    let bias = s32(&[8]);
    let mut output = Tensor::new(TensorInfo::default());
    let mut k = QuantizeDownKernel::new();
    k.configure(input.info(), Some(bias.info()), output.info_mut(), params(0, 255)).unwrap();
    output.allocate();
    let pack = TensorPack::new().with_src(&input).with_dst(&mut output);
    k.run(k.window().unwrap(), &ThreadInfo::default(), &pack);
}

#[test]
#[should_panic(expected = "PreconditionViolation")]
fn run_with_unallocated_output_panics() {
    let input = s32(&[8, 4]);
    let mut output = Tensor::new(TensorInfo::default());
    let mut k = QuantizeDownKernel::new();
    k.configure(input.info(), None, output.info_mut(), params(0, 255)).unwrap();
    let pack = TensorPack::new().with_src(&input).with_dst(&mut output);
    k.run(k.window().unwrap(), &ThreadInfo::default(), &pack);
}

#[test]
fn scheduling_unconfigured_kernel_is_an_error() {
    let input = s32(&[8, 4]);
    let mut output = Tensor::new(TensorInfo::new(TensorShape::new(&[8, 4]), DataType::U8));
    output.allocate();
    let pack = TensorPack::new().with_src(&input).with_dst(&mut output);
    let scheduler = Scheduler::new(2).unwrap();
    let r = scheduler.schedule(&QuantizeDownKernel::new(), DIM_Y, &pack);
    assert!(matches!(r, Err(Error::PreconditionViolation(_))));
}

#[test]
fn untyped_output_descriptor_is_initialized_as_u8() {
    use requant::quantize::requantize_reference;
    let input = s32(&[64, 64]);
    let untyped = TensorInfo::new(TensorShape::new(&[64, 64]), DataType::Unknown);
    assert_eq!(QuantizeDownKernel::validate(input.info(), None, &untyped, 0, 255), Ok(()));

    let mut output = Tensor::new(untyped);
    let mut k = QuantizeDownKernel::new();
    k.configure(input.info(), None, output.info_mut(), params(0, 255)).unwrap();
    assert_eq!(output.info().data_type(), DataType::U8);
    assert_eq!(output.info().total_size(), 4096);

    output.allocate();
    {
        let pack = TensorPack::new().with_src(&input).with_dst(&mut output);
        k.run(k.window().unwrap(), &ThreadInfo::default(), &pack);
    }
    let p = params(0, 255);
    let expected = requantize_reference(&input.to_s32_vec(), None, &p.fixed_point(), ClampPolicy::select(0, 255));
    assert_eq!(output.to_u8_vec(), expected);
}

#[test]
fn rank_zero_input_has_nothing_to_run() {
    let input = Tensor::from_s32(TensorShape::default(), &[]).unwrap();
    let mut output = Tensor::new(TensorInfo::default());
    let mut k = QuantizeDownKernel::new();
    k.configure(input.info(), None, output.info_mut(), params(0, 255)).unwrap();
    let win = *k.window().unwrap();
    assert!(win.is_empty());
    assert_eq!(win.num_iterations_total(), 0);

    output.allocate();
    {
        let pack = TensorPack::new().with_src(&input).with_dst(&mut output);
        k.run(&win, &ThreadInfo::default(), &pack);
        Scheduler::new(2).unwrap().schedule(&k, DIM_Y, &pack).unwrap();
    }
    assert!(output.to_u8_vec().is_empty());
}
