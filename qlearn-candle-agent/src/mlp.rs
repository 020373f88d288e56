//! Multilayer perceptron.
mod base;
mod config;
use anyhow::Result;
pub use base::Mlp;
use candle_core::Tensor;
use candle_nn::{Linear, Module};
pub use config::MlpConfig;

fn mlp_forward(xs: Tensor, layers: &[Linear]) -> Result<Tensor> {
    let n_layers = layers.len();
    let mut xs = xs;

    for layer in layers[..n_layers - 1].iter() {
        xs = layer.forward(&xs)?.relu()?;
    }

    Ok(layers[n_layers - 1].forward(&xs)?)
}
