//! Loss of DQN with clipped TD errors.
use crate::{util::clip_td_error, QFunction};
use anyhow::Result;
use candle_core::{shape::D, Device, Tensor};
use candle_nn::loss::mse;
use qlearn_core::{ActionSet, QlearnError, TransitionBatch};

/// Returns the bootstrapped target of a transition.
///
/// `max_q_next` is ignored for terminal transitions.
pub fn bellman_target(reward: f32, max_q_next: f32, terminal: bool, gamma: f64) -> f32 {
    if terminal {
        reward
    } else {
        reward + (gamma as f32) * max_q_next
    }
}

/// Returns a copy of `q` in which the entry of the taken action in each row is
/// replaced by the target `ys[i]`.
pub fn target_matrix(q: &[Vec<f32>], action_ixs: &[usize], ys: &[f32]) -> Vec<Vec<f32>> {
    q.iter()
        .zip(action_ixs.iter().zip(ys.iter()))
        .map(|(row, (&ix, &y))| {
            let mut row = row.clone();
            row[ix] = y;
            row
        })
        .collect()
}

/// Builds the loss of a mini-batch.
///
/// Returns the scalar loss, differentiable with respect to the parameters of
/// `online`, and the action values of `online` on the states of the batch.
/// Targets are computed with `target` and do not carry gradients.
pub fn td_loss<F: QFunction>(
    online: &F,
    target: &F,
    batch: &TransitionBatch,
    actions: &ActionSet,
    gamma: f64,
) -> Result<(Tensor, Tensor)> {
    let [b, hist_size, dim] = batch.state_shape();
    let states = Tensor::from_slice(&batch.states, (b, hist_size, dim), &Device::Cpu)?;
    let next_states = Tensor::from_slice(&batch.next_states, (b, hist_size, dim), &Device::Cpu)?;

    let q = online.evaluate(&states)?;
    let n_actions = q.dims()[1];
    if n_actions != actions.len() {
        return Err(QlearnError::ShapeMismatch {
            expected: vec![b, actions.len()],
            got: q.dims().to_vec(),
        }
        .into());
    }

    let max_q_next: Vec<f32> = target
        .evaluate(&next_states)?
        .detach()
        .max(D::Minus1)?
        .to_vec1()?;
    let ys = (0..b)
        .map(|i| bellman_target(batch.rewards[i], max_q_next[i], batch.terminal[i], gamma))
        .collect::<Vec<_>>();
    let action_ixs = batch
        .actions
        .iter()
        .map(|&a| actions.action_to_index(a))
        .collect::<Result<Vec<_>, _>>()?;

    let tgt = {
        let q_data: Vec<Vec<f32>> = q.detach().to_vec2()?;
        let tgt = target_matrix(&q_data, &action_ixs, &ys);
        let tgt = tgt.into_iter().flatten().collect::<Vec<_>>();
        Tensor::from_vec(tgt, (b, n_actions), q.device())?
    };

    let td = clip_td_error(&tgt.sub(&q)?)?;
    let loss = mse(&td, &td.zeros_like()?)?;

    Ok((loss, q))
}
