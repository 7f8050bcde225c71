use crate::error::{Error, Result};
use crate::kernels::{Kernel, TensorPack, ThreadInfo};
use crate::window::DIM_Y;
use log::debug;
use rayon::prelude::*;

/// Axis a kernel window is split along unless the caller says otherwise.
pub const DEFAULT_SPLIT_DIMENSION: usize = DIM_Y;

/// Splits a configured kernel's window into contiguous slices along one axis
/// and runs them on a private rayon pool.
pub struct Scheduler {
    pool: rayon::ThreadPool,
    num_threads: usize,
}

impl Scheduler {
    pub fn new(num_threads: usize) -> Result<Self> {
        let num_threads = num_threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;
        Ok(Self { pool, num_threads })
    }

    pub fn num_threads(&self) -> usize { self.num_threads }

    /// Run `kernel` over its whole window, one slice per worker. Returns once
    /// every slice has completed.
    pub fn schedule<K: Kernel>(&self, kernel: &K, split_dimension: usize, pack: &TensorPack<'_>) -> Result<()> {
        let window = *kernel
            .window()
            .ok_or_else(|| Error::PreconditionViolation(format!("{} scheduled before configure", kernel.name())))?;
        pack.src()?;
        pack.dst()?;

        let num_windows = self.num_threads.min(window.num_iterations(split_dimension)).max(1);
        debug!("{}: {} sub-windows along axis {} of {}", kernel.name(), num_windows, split_dimension, window);
        if num_windows == 1 {
            kernel.run(&window, &ThreadInfo::default(), pack);
            return Ok(());
        }
        self.pool.install(|| {
            (0..num_windows).into_par_iter().for_each(|id| {
                let sub = window.split_window(split_dimension, id, num_windows);
                kernel.run(&sub, &ThreadInfo { thread_id: id, num_threads: num_windows }, pack);
            })
        });
        Ok(())
    }
}
