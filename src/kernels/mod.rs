//! CPU kernels share a validate / configure / run lifecycle. `run` receives the
//! tensors through a `TensorPack` so one configured kernel can be driven over
//! many sub-windows, from several threads, against caller-owned buffers.

pub mod quantize_down;

pub use quantize_down::{QuantizeDownKernel, QuantizeDownParams};

use crate::error::{Error, Result};
use crate::tensor::{Tensor, TensorView};
use crate::window::Window;
use std::sync::Mutex;

/// Per-invocation context handed to `run` by the scheduler. Read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInfo {
    pub thread_id: usize,
    pub num_threads: usize,
}

impl Default for ThreadInfo {
    fn default() -> Self { Self { thread_id: 0, num_threads: 1 } }
}

pub trait Kernel: Sync {
    fn name(&self) -> &'static str;

    /// Window established by `configure`; `None` while unconfigured.
    fn window(&self) -> Option<&Window>;

    /// Process `window`, which must be a sub-window of `self.window()`.
    /// Panics on any precondition violation.
    fn run(&self, window: &Window, info: &ThreadInfo, pack: &TensorPack<'_>);
}

/// Tensors bound to one or more `run` calls.
///
/// The pack tracks which destination windows are being written; a run whose
/// window intersects one still in flight is rejected, so concurrent runs on a
/// shared pack always write disjoint elements.
#[derive(Debug, Default)]
pub struct TensorPack<'a> {
    src: Option<TensorView<'a>>,
    bias: Option<TensorView<'a>>,
    dst: Option<TensorView<'a>>,
    in_flight: Mutex<InFlight>,
}

#[derive(Debug, Default)]
struct InFlight {
    next_id: u64,
    windows: Vec<(u64, Window)>,
}

impl<'a> TensorPack<'a> {
    pub fn new() -> Self { Self::default() }

    pub fn with_src(mut self, tensor: &'a Tensor) -> Self {
        self.src = Some(tensor.view());
        self
    }

    pub fn with_bias(mut self, tensor: &'a Tensor) -> Self {
        self.bias = Some(tensor.view());
        self
    }

    pub fn with_dst(mut self, tensor: &'a mut Tensor) -> Self {
        self.dst = Some(tensor.view_mut());
        self
    }

    pub fn src(&self) -> Result<TensorView<'a>> {
        self.src.ok_or_else(|| Error::NullArgument("tensor pack has no source tensor".into()))
    }

    pub fn bias(&self) -> Option<TensorView<'a>> { self.bias }

    pub fn has_dst(&self) -> bool { self.dst.is_some() }

    pub(crate) fn dst(&self) -> Result<TensorView<'a>> {
        self.dst.ok_or_else(|| Error::NullArgument("tensor pack has no destination tensor".into()))
    }

    /// Reserve `window` of the destination until the returned claim drops.
    pub(crate) fn claim(&self, window: &Window) -> WindowClaim<'_> {
        let mut guard = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let overlapping = guard.windows.iter().find(|(_, w)| w.intersects(window)).map(|(_, w)| *w);
        if let Some(other) = overlapping {
            drop(guard);
            panic!("PreconditionViolation: window {} overlaps window {} already running", window, other);
        }
        let id = guard.next_id;
        guard.next_id += 1;
        guard.windows.push((id, *window));
        WindowClaim { in_flight: &self.in_flight, id }
    }
}

pub(crate) struct WindowClaim<'p> {
    in_flight: &'p Mutex<InFlight>,
    id: u64,
}

impl Drop for WindowClaim<'_> {
    fn drop(&mut self) {
        let mut guard = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        guard.windows.retain(|(id, _)| *id != self.id);
    }
}
