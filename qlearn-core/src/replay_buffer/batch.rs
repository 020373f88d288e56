//! Batch of transitions sampled from [`ReplayBuffer`](super::ReplayBuffer).
use crate::action::ActionId;

/// A batch of transitions as five parallel arrays.
///
/// `states` and `next_states` are flattened row-major with shape
/// `[len, hist_size, dim]`. The `next_states` rows of terminal transitions are
/// zero-filled.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionBatch {
    /// States.
    pub states: Vec<f32>,

    /// Actions.
    pub actions: Vec<ActionId>,

    /// Rewards.
    pub rewards: Vec<f32>,

    /// Next states.
    pub next_states: Vec<f32>,

    /// Terminal flags.
    pub terminal: Vec<bool>,

    /// Buffer slots the samples were taken from.
    pub ix_sample: Vec<usize>,

    pub(super) hist_size: usize,
    pub(super) dim: usize,
}

impl TransitionBatch {
    /// Creates a batch from parallel arrays.
    ///
    /// Used to feed hand-made batches into the loss computation.
    pub fn new(
        hist_size: usize,
        dim: usize,
        states: Vec<f32>,
        actions: Vec<ActionId>,
        rewards: Vec<f32>,
        next_states: Vec<f32>,
        terminal: Vec<bool>,
    ) -> Self {
        let ix_sample = (0..actions.len()).collect();
        Self {
            states,
            actions,
            rewards,
            next_states,
            terminal,
            ix_sample,
            hist_size,
            dim,
        }
    }

    /// The number of samples.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if the batch has no samples.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns `[len, hist_size, dim]`.
    pub fn state_shape(&self) -> [usize; 3] {
        [self.len(), self.hist_size, self.dim]
    }
}
