use crate::util::IoDim;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`](super::Mlp).
pub struct MlpConfig {
    pub(super) in_dim: usize,
    pub(super) units: Vec<usize>,
    pub(super) out_dim: usize,
    #[serde(default = "default_zero_init_out")]
    pub(super) zero_init_out: bool,
}

fn default_zero_init_out() -> bool {
    true
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            in_dim: 0,
            units: vec![256, 256],
            out_dim: 0,
            zero_init_out: true,
        }
    }
}

impl MlpConfig {
    /// Creates configuration of MLP.
    ///
    /// * `units` - Widths of the hidden layers, each followed by ReLU.
    pub fn new(in_dim: usize, units: Vec<usize>, out_dim: usize) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            zero_init_out: true,
        }
    }

    /// If `true` (default), weights and bias of the output layer start at zero.
    pub fn zero_init_out(mut self, v: bool) -> Self {
        self.zero_init_out = v;
        self
    }
}

impl IoDim for MlpConfig {
    fn get_in_dim(&self) -> usize {
        self.in_dim
    }

    fn set_in_dim(&mut self, in_dim: usize) {
        self.in_dim = in_dim;
    }

    fn get_out_dim(&self) -> usize {
        self.out_dim
    }

    fn set_out_dim(&mut self, out_dim: usize) {
        self.out_dim = out_dim;
    }
}
