//! DQN agent implemented with [candle](https://crates.io/crates/candle-core).
//!
//! * [`dqn::Dqn`] trains an action-value function with experience replay and a
//!   periodically synchronized target network.
//! * [`QFunction`] is the interface of the action-value function.
//!   [`dqn::DqnModel`] implements it with any [`model::SubModel1`] network,
//!   e.g. [`mlp::Mlp`].
//! * [`persistence::SnapshotStore`] saves and loads snapshots of parameters.
use anyhow::Result;
use serde::{Deserialize, Serialize};
pub mod dqn;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod persistence;
mod qfunction;
pub mod util;
pub use qfunction::QFunction;

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl Device {
    /// Selects CUDA device 0 if `use_accelerated_device` and it is available,
    /// otherwise CPU.
    pub fn from_flag(use_accelerated_device: bool) -> Self {
        match use_accelerated_device && candle_core::utils::cuda_is_available() {
            true => Self::Cuda(0),
            false => Self::Cpu,
        }
    }

    /// Creates the corresponding [`candle_core::Device`].
    pub fn create(&self) -> Result<candle_core::Device> {
        Ok(match self {
            Self::Cpu => candle_core::Device::Cpu,
            Self::Cuda(n) => candle_core::Device::new_cuda(*n)?,
        })
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}
