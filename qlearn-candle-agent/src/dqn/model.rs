use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::{copy_varmap, IoDim, NamedTensors},
    QFunction,
};
use anyhow::{ensure, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use qlearn_core::{QlearnError, OBS_RANGE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`DqnModel`].
pub struct DqnModelConfig<Q>
where
    Q: IoDim,
{
    pub(super) q_config: Option<Q>,
    pub(super) opt_config: OptimizerConfig,
    pub(super) hist_size: usize,
    pub(super) dim: usize,
}

impl<Q> Default for DqnModelConfig<Q>
where
    Q: IoDim,
{
    fn default() -> Self {
        Self {
            q_config: None,
            opt_config: OptimizerConfig::default(),
            hist_size: 4,
            dim: 1,
        }
    }
}

impl<Q> DqnModelConfig<Q>
where
    Q: DeserializeOwned + Serialize + IoDim,
{
    /// Sets configurations for action-value function.
    ///
    /// The input dimension is overwritten with `hist_size * dim`.
    pub fn q_config(mut self, mut v: Q) -> Self {
        v.set_in_dim(self.hist_size * self.dim);
        self.q_config = Some(v);
        self
    }

    /// Sets the shape of a state, `[hist_size, dim]`.
    pub fn state_shape(mut self, hist_size: usize, dim: usize) -> Self {
        self.hist_size = hist_size;
        self.dim = dim;
        if let Some(q_config) = &mut self.q_config {
            q_config.set_in_dim(hist_size * dim);
        }
        self
    }

    /// Sets output dimension of the model, the number of actions.
    pub fn out_dim(mut self, v: usize) -> Self {
        if let Some(q_config) = &mut self.q_config {
            q_config.set_out_dim(v);
        }
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Constructs [`DqnModelConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DqnModelConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Action-value function with its own variables and optimizer.
///
/// Raw states `[batch_size, hist_size, dim]` are divided by [`OBS_RANGE`] and
/// flattened before being fed to the network `Q`.
pub struct DqnModel<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + IoDim + Clone,
{
    device: Device,
    varmap: VarMap,
    hist_size: usize,
    dim: usize,

    // Action-value function
    q: Q,

    // Optimizer
    opt_config: OptimizerConfig,
    q_config: Q::Config,
    opt: Optimizer,
}

impl<Q> DqnModel<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + IoDim + Clone,
{
    /// Constructs [`DqnModel`].
    pub fn build(config: DqnModelConfig<Q::Config>, device: Device) -> Result<Self> {
        let q_config = config.q_config.context("q_config is not set.")?;
        ensure!(
            config.hist_size > 0 && config.dim > 0,
            QlearnError::InvalidConfig(format!(
                "state shape must be positive: [{}, {}]",
                config.hist_size, config.dim
            ))
        );
        ensure!(
            q_config.get_in_dim() == config.hist_size * config.dim,
            QlearnError::InvalidConfig(format!(
                "input dimension {} does not match state shape [{}, {}]",
                q_config.get_in_dim(),
                config.hist_size,
                config.dim
            ))
        );
        Self::_build(
            device,
            config.hist_size,
            config.dim,
            config.opt_config,
            q_config,
        )
    }

    fn _build(
        device: Device,
        hist_size: usize,
        dim: usize,
        opt_config: OptimizerConfig,
        q_config: Q::Config,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            Q::build(vb, q_config.clone())?
        };
        let opt = opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            varmap,
            hist_size,
            dim,
            q,
            opt_config,
            q_config,
            opt,
        })
    }

    /// Saves the variables in safetensors format.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save dqnmodel to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the variables saved with [`DqnModel::save`].
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load dqnmodel from {:?}", path.as_ref());
        Ok(())
    }
}

impl<Q> QFunction for DqnModel<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + IoDim + Clone,
{
    fn evaluate(&self, states: &Tensor) -> Result<Tensor> {
        let dims = states.dims();
        if dims.len() != 3 || dims[1] != self.hist_size || dims[2] != self.dim {
            return Err(QlearnError::ShapeMismatch {
                expected: vec![dims.first().copied().unwrap_or(0), self.hist_size, self.dim],
                got: dims.to_vec(),
            }
            .into());
        }

        let xs = states
            .to_device(&self.device)?
            .to_dtype(DType::F32)?
            .affine(1.0 / OBS_RANGE, 0.0)?
            .flatten_from(1)?;
        self.q.forward(&xs)
    }

    fn parameters(&self) -> Result<NamedTensors> {
        NamedTensors::copy_from(&self.varmap)
    }

    fn load_parameters(&mut self, params: &NamedTensors) -> Result<()> {
        params.copy_to(&self.varmap)
    }

    fn try_clone(&self) -> Result<Self> {
        let model = Self::_build(
            self.device.clone(),
            self.hist_size,
            self.dim,
            self.opt_config.clone(),
            self.q_config.clone(),
        )?;
        copy_varmap(&model.varmap, &self.varmap)?;
        Ok(model)
    }

    fn gradient_step(&mut self, loss: &Tensor) -> Result<()> {
        let grads = loss.backward()?;
        self.opt.step(&grads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlp::{Mlp, MlpConfig};
    use tempdir::TempDir;

    fn model_config(hist_size: usize, dim: usize, n_actions: usize) -> DqnModelConfig<MlpConfig> {
        DqnModelConfig::default()
            .state_shape(hist_size, dim)
            .q_config(MlpConfig::new(0, vec![16, 16], n_actions).zero_init_out(false))
            .opt_config(OptimizerConfig::Adam { lr: 0.01 })
    }

    #[test]
    fn test_evaluate_normalizes_input() -> Result<()> {
        let model = DqnModel::<Mlp>::build(model_config(2, 3, 4), Device::Cpu)?;
        let raw = Tensor::new(&[[[255f32, 0., 51.], [102., 255., 0.]]], &Device::Cpu)?;
        let scaled = raw.affine(1.0 / OBS_RANGE, 0.0)?.flatten_from(1)?;

        let q1: Vec<Vec<f32>> = model.evaluate(&raw)?.to_vec2()?;
        let q2: Vec<Vec<f32>> = model.q.forward(&scaled)?.to_vec2()?;
        assert_eq!(q1, q2);
        assert_eq!(q1[0].len(), 4);
        Ok(())
    }

    #[test]
    fn test_evaluate_rejects_wrong_shape() -> Result<()> {
        let model = DqnModel::<Mlp>::build(model_config(2, 3, 4), Device::Cpu)?;
        let xs = Tensor::zeros((5, 3, 2), DType::F32, &Device::Cpu)?;
        let err = model.evaluate(&xs).unwrap_err();
        assert_eq!(
            err.downcast_ref::<QlearnError>(),
            Some(&QlearnError::ShapeMismatch {
                expected: vec![5, 2, 3],
                got: vec![5, 3, 2]
            })
        );
        Ok(())
    }

    #[test]
    fn test_try_clone_is_independent() -> Result<()> {
        let mut model = DqnModel::<Mlp>::build(model_config(1, 2, 3), Device::Cpu)?;
        let clone = model.try_clone()?;
        let p0 = model.parameters()?;
        assert_eq!(p0.max_abs_diff(&clone.parameters()?)?, 0.0);

        let xs = Tensor::new(&[[[200f32, 10.]], [[3., 90.]]], &Device::Cpu)?;
        let loss = model.evaluate(&xs)?.sqr()?.mean_all()?;
        model.gradient_step(&loss)?;

        assert!(model.parameters()?.max_abs_diff(&p0)? > 0.0);
        assert_eq!(clone.parameters()?.max_abs_diff(&p0)?, 0.0);
        Ok(())
    }

    #[test]
    fn test_load_parameters() -> Result<()> {
        let model1 = DqnModel::<Mlp>::build(model_config(1, 2, 3), Device::Cpu)?;
        let mut model2 = DqnModel::<Mlp>::build(model_config(1, 2, 3), Device::Cpu)?;
        assert!(model1.parameters()?.max_abs_diff(&model2.parameters()?)? > 0.0);

        model2.load_parameters(&model1.parameters()?)?;
        assert_eq!(model1.parameters()?.max_abs_diff(&model2.parameters()?)?, 0.0);

        let other = DqnModel::<Mlp>::build(model_config(1, 2, 5), Device::Cpu)?;
        assert!(model2.load_parameters(&other.parameters()?).is_err());
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new("dqn_model")?;
        let path = dir.path().join("qnet.safetensors");
        let model1 = DqnModel::<Mlp>::build(model_config(1, 2, 3), Device::Cpu)?;
        let mut model2 = DqnModel::<Mlp>::build(model_config(1, 2, 3), Device::Cpu)?;

        model1.save(&path)?;
        model2.load(&path)?;
        assert_eq!(model1.parameters()?.max_abs_diff(&model2.parameters()?)?, 0.0);
        Ok(())
    }

    #[test]
    fn test_serde_dqn_model_config() -> Result<()> {
        let config = model_config(4, 2, 3);
        let dir = TempDir::new("dqn_model_config")?;
        let path = dir.path().join("dqn_model_config.yaml");
        config.save(&path)?;
        let config_ = DqnModelConfig::<MlpConfig>::load(&path)?;
        assert_eq!(config, config_);
        assert_eq!(config_.q_config.map(|c| c.get_in_dim()), Some(8));
        Ok(())
    }
}
