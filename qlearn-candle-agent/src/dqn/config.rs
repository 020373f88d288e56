//! Configuration of DQN agent.
use super::{DqnModelConfig, EpsilonGreedy};
use crate::{util::IoDim, Device};
use anyhow::Result;
use log::info;
use qlearn_core::ActionId;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Configuration of [`Dqn`](super::Dqn) agent.
///
/// `C` is the configuration type of the network of the action-value function,
/// e.g. [`MlpConfig`](crate::mlp::MlpConfig).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DqnConfig<C>
where
    C: IoDim,
{
    pub model_config: DqnModelConfig<C>,
    pub device: Device,
    pub actions: Vec<ActionId>,
    pub state_dim: usize,
    pub hist_size: usize,
    pub gamma: f64,
    pub batch_size: usize,
    pub buffer_capacity: usize,
    pub target_update_interval: usize,
    pub snapshot_interval: usize,
    pub min_transitions_warmup: usize,
    pub explorer: EpsilonGreedy,
    pub seed: u64,
    pub model_dir: Option<PathBuf>,
}

impl<C> Default for DqnConfig<C>
where
    C: IoDim,
{
    /// Constructs DQN config with default parameters.
    fn default() -> Self {
        Self {
            model_config: Default::default(),
            device: Device::Cpu,
            actions: vec![],
            state_dim: 1,
            hist_size: 4,
            gamma: 0.99,
            batch_size: 32,
            buffer_capacity: 10_000,
            target_update_interval: 100,
            snapshot_interval: 1_000,
            min_transitions_warmup: 1_000,
            explorer: EpsilonGreedy::default(),
            seed: 42,
            model_dir: None,
        }
    }
}

impl<C> DqnConfig<C>
where
    C: DeserializeOwned + Serialize + IoDim,
{
    /// Sets the configuration of the model.
    pub fn model_config(mut self, model_config: DqnModelConfig<C>) -> Self {
        self.model_config = model_config;
        self
    }

    /// Sets device.
    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Uses CUDA device 0 if `v` and it is available.
    pub fn use_accelerated_device(mut self, v: bool) -> Self {
        self.device = Device::from_flag(v);
        self
    }

    /// Sets the ordered list of legal actions.
    pub fn actions(mut self, actions: Vec<ActionId>) -> Self {
        self.actions = actions;
        self
    }

    /// Sets the dimension of an observation frame.
    pub fn state_dim(mut self, v: usize) -> Self {
        self.state_dim = v;
        self
    }

    /// Sets the number of frames in a state.
    pub fn hist_size(mut self, v: usize) -> Self {
        self.hist_size = v;
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the capacity of the replay buffer.
    pub fn buffer_capacity(mut self, v: usize) -> Self {
        self.buffer_capacity = v;
        self
    }

    /// Sets the interval of steps between synchronizations of the target network.
    pub fn target_update_interval(mut self, v: usize) -> Self {
        self.target_update_interval = v;
        self
    }

    /// Sets the interval of steps between snapshots of the online network.
    pub fn snapshot_interval(mut self, v: usize) -> Self {
        self.snapshot_interval = v;
        self
    }

    /// Sets the step from which experience replay starts.
    pub fn min_transitions_warmup(mut self, v: usize) -> Self {
        self.min_transitions_warmup = v;
        self
    }

    /// Sets the explorer.
    pub fn explorer(mut self, v: EpsilonGreedy) -> Self {
        self.explorer = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the directory where snapshots of the model are saved.
    pub fn model_dir(mut self, v: impl AsRef<Path>) -> Self {
        self.model_dir = Some(v.as_ref().to_path_buf());
        self
    }

    /// Loads [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of DQN agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`DqnConfig`] to YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of DQN agent into {:?}", path_);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mlp::MlpConfig, opt::OptimizerConfig};
    use tempdir::TempDir;

    #[test]
    fn test_serde_dqn_config() -> Result<()> {
        let model_config = DqnModelConfig::default()
            .q_config(MlpConfig::new(0, vec![64, 64], 0))
            .opt_config(OptimizerConfig::Adam { lr: 0.001 });
        let config = DqnConfig::default()
            .model_config(model_config)
            .actions(vec![0, 1, 2])
            .state_dim(3)
            .hist_size(2)
            .gamma(0.9)
            .batch_size(16)
            .buffer_capacity(500)
            .target_update_interval(10)
            .snapshot_interval(50)
            .min_transitions_warmup(20)
            .explorer(EpsilonGreedy::with_final_step(300))
            .seed(1)
            .model_dir("model");

        let dir = TempDir::new("dqn_config")?;
        let path = dir.path().join("dqn_config.yaml");
        config.save(&path)?;
        let config_ = DqnConfig::<MlpConfig>::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_default_dqn_config() {
        let config = DqnConfig::<MlpConfig>::default();
        assert_eq!(config.hist_size, 4);
        assert_eq!(config.gamma, 0.99);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.buffer_capacity, 10_000);
        assert_eq!(config.target_update_interval, 100);
        assert_eq!(config.snapshot_interval, 1_000);
        assert_eq!(config.device, Device::Cpu);
    }
}
