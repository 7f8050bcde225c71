use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use requant::config::RequantConfig;
use requant::quantize::{quantize_multiplier, requantize_reference, ClampPolicy};
use requant::scheduler::DEFAULT_SPLIT_DIMENSION;
use requant::tensor::{Tensor, TensorInfo, TensorShape};
use requant::{QuantizeDownKernel, Scheduler, TensorPack};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "requant", version, about = "Requantize random int32 accumulators to uint8 and report throughput")]
struct Args {
    /// JSON config file; the flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tensor extents, axis 0 first (e.g. 64,32)
    #[arg(long, value_delimiter = ',')]
    shape: Option<Vec<usize>>,

    /// Real scale in (0,1); derives multiplier and shift
    #[arg(long)]
    scale: Option<f64>,

    /// Q31 fixed-point multiplier
    #[arg(long)]
    multiplier: Option<i32>,

    /// Right shift after the multiply (0..=31)
    #[arg(long)]
    shift: Option<i32>,

    /// Offset added after the shift
    #[arg(long, allow_hyphen_values = true)]
    offset: Option<i32>,

    /// Lower clamp bound
    #[arg(long)]
    min: Option<i32>,

    /// Upper clamp bound
    #[arg(long)]
    max: Option<i32>,

    /// Skip the per-column bias
    #[arg(long, default_value_t = false)]
    no_bias: bool,

    /// Worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// RNG seed for the accumulators
    #[arg(long)]
    seed: Option<u64>,

    /// Timed repetitions
    #[arg(long, default_value_t = 1)]
    iters: usize,

    /// Compare against the scalar reference
    #[arg(long, default_value_t = false)]
    verify: bool,

    /// Print the report as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Serialize, Debug)]
struct Report {
    shape: Vec<usize>,
    threads: usize,
    iters: usize,
    bias: bool,
    policy: String,
    multiplier: i32,
    shift: i32,
    elapsed_s: f64,
    melem_per_s: f64,
    mean_output: f64,
    verified: Option<bool>,
}

fn apply_overrides(cfg: &mut RequantConfig, args: &Args) -> Result<()> {
    if let Some(shape) = &args.shape { cfg.shape = shape.clone(); }
    if let Some(scale) = args.scale {
        let (multiplier, shift) = quantize_multiplier(scale).context("derive multiplier from --scale")?;
        cfg.params.multiplier = multiplier;
        cfg.params.shift = shift;
    }
    if let Some(m) = args.multiplier { cfg.params.multiplier = m; }
    if let Some(s) = args.shift { cfg.params.shift = s; }
    if let Some(o) = args.offset { cfg.params.offset = o; }
    if let Some(m) = args.min { cfg.params.min = m; }
    if let Some(m) = args.max { cfg.params.max = m; }
    if args.no_bias { cfg.bias = false; }
    if let Some(t) = args.threads { cfg.threads = t.max(1); }
    if let Some(s) = args.seed { cfg.seed = s; }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => RequantConfig::from_json_file(path)?,
        None => RequantConfig::default(),
    };
    apply_overrides(&mut cfg, &args)?;
    let shape = cfg.tensor_shape()?;

    // GEMM accumulators cluster around zero with a wide tail.
    let mut rng = SmallRng::seed_from_u64(cfg.seed);
    let dist = Normal::new(0.0f64, (1u32 << 20) as f64).context("accumulator distribution")?;
    let values: Vec<i32> = (0..shape.total_size())
        .map(|_| dist.sample(&mut rng).clamp(i32::MIN as f64, i32::MAX as f64) as i32)
        .collect();
    let input = Tensor::from_s32(shape, &values)?;
    let bias = if cfg.bias {
        let b: Vec<i32> = (0..shape.dim(0)).map(|_| rng.gen_range(-(1 << 16)..(1 << 16))).collect();
        Some(Tensor::from_s32(TensorShape::new(&[shape.dim(0)]), &b)?)
    } else {
        None
    };

    let mut output = Tensor::new(TensorInfo::default());
    let mut kernel = QuantizeDownKernel::new();
    kernel.configure(input.info(), bias.as_ref().map(|b| b.info()), output.info_mut(), cfg.params)?;
    output.allocate();

    let scheduler = Scheduler::new(cfg.threads)?;
    if cfg.threads > shape.dim(DEFAULT_SPLIT_DIMENSION) {
        warn!("{} threads requested but only {} rows to split", cfg.threads, shape.dim(DEFAULT_SPLIT_DIMENSION));
    }
    info!("shape {} threads {} params {:?}", shape, scheduler.num_threads(), cfg.params);

    let pb = ProgressBar::new(args.iters as u64);
    pb.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {elapsed}").unwrap_or_else(|_| ProgressStyle::default_bar()));
    let t0 = Instant::now();
    for _ in 0..args.iters {
        let mut pack = TensorPack::new().with_src(&input);
        if let Some(b) = &bias { pack = pack.with_bias(b); }
        let pack = pack.with_dst(&mut output);
        scheduler.schedule(&kernel, DEFAULT_SPLIT_DIMENSION, &pack)?;
        pb.inc(1);
    }
    pb.finish_and_clear();
    let dt = t0.elapsed().as_secs_f64();

    let policy = ClampPolicy::select(cfg.params.min, cfg.params.max);
    let out = output.to_u8_vec();
    let verified = if args.verify {
        let bias_values = bias.as_ref().map(|b| b.to_s32_vec());
        let expected = requantize_reference(&values, bias_values.as_deref(), &cfg.params.fixed_point(), policy);
        let mismatches = expected.iter().zip(out.iter()).filter(|(a, b)| a != b).count();
        if mismatches > 0 {
            bail!("{} of {} outputs differ from the scalar reference", mismatches, expected.len());
        }
        Some(true)
    } else {
        None
    };

    let elems = (shape.total_size() * args.iters) as f64;
    let report = Report {
        shape: shape.dims().to_vec(),
        threads: scheduler.num_threads(),
        iters: args.iters,
        bias: cfg.bias,
        policy: format!("{:?}", policy),
        multiplier: cfg.params.multiplier,
        shift: cfg.params.shift,
        elapsed_s: dt,
        melem_per_s: if dt > 0.0 { elems / dt / 1e6 } else { 0.0 },
        mean_output: if out.is_empty() { 0.0 } else { out.iter().map(|&v| v as f64).sum::<f64>() / out.len() as f64 },
        verified,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "shape={} threads={} iters={} policy={} elapsed={:.3}s throughput={:.1} Melem/s mean={:.2}{}",
            shape, report.threads, report.iters, report.policy, report.elapsed_s, report.melem_per_s, report.mean_output,
            if verified == Some(true) { " verified" } else { "" }
        );
    }
    Ok(())
}
