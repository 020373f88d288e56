use crate::util::NamedTensors;
use anyhow::Result;
use candle_core::Tensor;

/// Capability interface of a differentiable action-value function.
///
/// The agent holds two instances: the online one, which is trained, and the
/// target one, which is a frozen value copy of the online instance.
pub trait QFunction: Sized {
    /// Returns action values `[batch_size, n_actions]` given raw states
    /// `[batch_size, hist_size, dim]`.
    ///
    /// Implementations normalize raw observations by
    /// [`OBS_RANGE`](qlearn_core::OBS_RANGE) before any learned layer.
    fn evaluate(&self, states: &Tensor) -> Result<Tensor>;

    /// Returns a value copy of the parameters.
    fn parameters(&self) -> Result<NamedTensors>;

    /// Overwrites the parameters with the given values.
    fn load_parameters(&mut self, params: &NamedTensors) -> Result<()>;

    /// Returns a new instance with value-equal, independently owned parameters.
    fn try_clone(&self) -> Result<Self>;

    /// Applies one optimizer update using the gradient of `loss`.
    ///
    /// Gradients of a previous call must not contribute to this update.
    fn gradient_step(&mut self, loss: &Tensor) -> Result<()>;
}
