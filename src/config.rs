use crate::error::Error;
use crate::kernels::QuantizeDownParams;
use crate::tensor::{TensorShape, MAX_DIMS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Driver settings, loadable from JSON. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequantConfig {
    /// Accumulator tensor extents, axis 0 first.
    pub shape: Vec<usize>,
    pub params: QuantizeDownParams,
    /// Fuse a per-column bias.
    pub bias: bool,
    pub threads: usize,
    pub seed: u64,
}

impl Default for RequantConfig {
    fn default() -> Self {
        Self { shape: vec![64, 32], params: QuantizeDownParams::default(), bias: true, threads: 1, seed: 42 }
    }
}

impl RequantConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(&path).with_context(|| format!("open config file: {}", path.as_ref().display()))?;
        let cfg = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse config file: {}", path.as_ref().display()))?;
        Ok(cfg)
    }

    pub fn tensor_shape(&self) -> crate::Result<TensorShape> {
        if self.shape.is_empty() || self.shape.len() > MAX_DIMS {
            return Err(Error::InvalidArgument(format!("shape needs 1..={} extents, got {:?}", MAX_DIMS, self.shape)));
        }
        Ok(TensorShape::new(&self.shape))
    }
}
