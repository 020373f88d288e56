use super::{mlp_forward, MlpConfig};
use crate::model::SubModel1;
use anyhow::{ensure, Result};
use candle_core::{Device, Tensor};
use candle_nn::{linear, Init, Linear, VarBuilder};

/// Returns vector of linear modules from [`MlpConfig`].
fn create_linear_layers(prefix: &str, vs: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let mut dims = vec![config.in_dim];
    dims.extend(config.units.iter().copied());
    dims.push(config.out_dim);
    let vs = vs.pp(prefix);
    let n_layers = dims.len() - 1;

    dims.windows(2)
        .enumerate()
        .map(|(i, w)| {
            let (in_dim, out_dim) = (w[0], w[1]);
            let vs = vs.pp(format!("ln{}", i));
            if i == n_layers - 1 && config.zero_init_out {
                let ws = vs.get_with_hints((out_dim, in_dim), "weight", Init::Const(0.))?;
                let bs = vs.get_with_hints(out_dim, "bias", Init::Const(0.))?;
                Ok(Linear::new(ws, Some(bs)))
            } else {
                Ok(linear(in_dim, out_dim, vs)?)
            }
        })
        .collect()
}

/// Multilayer perceptron with ReLU activation function.
///
/// The input is a batch of flattened states, `[batch_size, in_dim]`.
pub struct Mlp {
    device: Device,
    layers: Vec<Linear>,
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Result<Tensor> {
        let xs = xs.to_device(&self.device)?;
        mlp_forward(xs, &self.layers)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        ensure!(
            config.in_dim > 0 && config.out_dim > 0,
            "in_dim and out_dim of MLP must be positive: {:?}",
            config
        );
        let device = vs.device().clone();
        let layers = create_linear_layers("mlp", vs, &config)?;

        Ok(Mlp { device, layers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    #[test]
    fn test_zero_initialized_output() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp = Mlp::build(vb, MlpConfig::new(3, vec![8, 8], 2))?;

        let xs = Tensor::new(&[[0.1f32, 0.5, 0.9], [1.0, 0.0, 0.3]], &Device::Cpu)?;
        let q = mlp.forward(&xs)?;
        assert_eq!(q.dims(), &[2, 2]);
        assert_eq!(q.to_vec2::<f32>()?, vec![vec![0.0, 0.0], vec![0.0, 0.0]]);

        // Three linear layers, each with weight and bias.
        assert_eq!(varmap.all_vars().len(), 6);
        Ok(())
    }
}
