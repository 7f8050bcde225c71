// Int32 GEMM accumulators -> uint8 requantization on windowed CPU kernels
pub mod error;
pub mod tensor;
pub mod window;
pub mod quantize;
pub mod kernels;
pub mod scheduler;
pub mod config;

pub use error::{Error, Result, Status};
pub use kernels::{Kernel, QuantizeDownKernel, QuantizeDownParams, TensorPack, ThreadInfo};
pub use scheduler::Scheduler;
