//! Circular replay buffer backed by parallel arrays.
use super::{ReplayBufferConfig, Transition, TransitionBatch};
use crate::{action::ActionId, error::QlearnError, state::State};
use anyhow::Result;
use log::trace;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// A fixed-capacity replay buffer.
///
/// Storage is allocated once at construction: states, actions, rewards,
/// next states and terminal flags are kept in five arrays indexed by
/// `time % capacity`.
pub struct ReplayBuffer {
    capacity: usize,
    hist_size: usize,
    dim: usize,
    states: Vec<u8>,
    actions: Vec<ActionId>,
    rewards: Vec<i8>,
    next_states: Vec<u8>,
    terminal: Vec<bool>,
    rng: StdRng,
}

impl ReplayBuffer {
    /// Constructs a replay buffer.
    pub fn build(config: &ReplayBufferConfig) -> Result<Self> {
        if config.capacity == 0 || config.hist_size == 0 || config.dim == 0 {
            return Err(QlearnError::InvalidConfig(format!(
                "capacity, hist_size and dim must be positive: {:?}",
                config
            ))
            .into());
        }
        let capacity = config.capacity;
        let state_len = config.hist_size * config.dim;

        Ok(Self {
            capacity,
            hist_size: config.hist_size,
            dim: config.dim,
            states: vec![0; capacity * state_len],
            actions: vec![0; capacity],
            rewards: vec![0; capacity],
            next_states: vec![0; capacity * state_len],
            terminal: vec![false; capacity],
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// Capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `[hist_size, dim]`.
    pub fn state_shape(&self) -> [usize; 2] {
        [self.hist_size, self.dim]
    }

    /// Slot written at the given time.
    #[inline]
    pub fn slot(&self, time: usize) -> usize {
        time % self.capacity
    }

    /// The number of valid slots after `time` transitions have been recorded.
    #[inline]
    pub fn valid_len(&self, time: usize) -> usize {
        time.min(self.capacity)
    }

    #[inline]
    fn state_range(&self, slot: usize) -> std::ops::Range<usize> {
        let n = self.hist_size * self.dim;
        slot * n..(slot + 1) * n
    }

    /// Records a transition at slot `time % capacity`.
    ///
    /// The next state is not written for a terminal transition, so the slot
    /// keeps whatever it held before.
    pub fn record(&mut self, time: usize, tr: &Transition) -> Result<()> {
        tr.state.check_shape(self.hist_size, self.dim)?;
        if !tr.terminal {
            tr.next_state.check_shape(self.hist_size, self.dim)?;
        }

        let slot = self.slot(time);
        let range = self.state_range(slot);
        self.states[range.clone()].copy_from_slice(tr.state.data());
        self.actions[slot] = tr.action;
        self.rewards[slot] = tr.reward;
        if !tr.terminal {
            self.next_states[range].copy_from_slice(tr.next_state.data());
        }
        self.terminal[slot] = tr.terminal;

        trace!(
            "Recorded transition at slot {} (terminal: {}, reward: {})",
            slot,
            tr.terminal,
            tr.reward
        );
        Ok(())
    }

    /// Samples `batch_size` transitions uniformly with replacement from the
    /// slots valid at `time`.
    ///
    /// Returns [`QlearnError::InsufficientHistory`] if `time == 0`.
    pub fn sample(&mut self, batch_size: usize, time: usize) -> Result<TransitionBatch> {
        let n = self.valid_len(time);
        if n == 0 {
            return Err(QlearnError::InsufficientHistory(time).into());
        }
        let ixs = (0..batch_size)
            .map(|_| self.rng.gen_range(0..n))
            .collect::<Vec<_>>();
        Ok(self.gather(ixs))
    }

    fn gather(&self, ixs: Vec<usize>) -> TransitionBatch {
        let state_len = self.hist_size * self.dim;
        let mut states = Vec::with_capacity(ixs.len() * state_len);
        let mut next_states = Vec::with_capacity(ixs.len() * state_len);

        for &ix in ixs.iter() {
            let range = self.state_range(ix);
            states.extend(self.states[range.clone()].iter().map(|&x| x as f32));
            if self.terminal[ix] {
                // The slot may hold a stale next state of an older transition.
                next_states.extend(std::iter::repeat(0f32).take(state_len));
            } else {
                next_states.extend(self.next_states[range].iter().map(|&x| x as f32));
            }
        }

        TransitionBatch {
            states,
            actions: ixs.iter().map(|&ix| self.actions[ix]).collect(),
            rewards: ixs.iter().map(|&ix| self.rewards[ix] as f32).collect(),
            next_states,
            terminal: ixs.iter().map(|&ix| self.terminal[ix]).collect(),
            ix_sample: ixs,
            hist_size: self.hist_size,
            dim: self.dim,
        }
    }

    /// Returns the transition stored at the given slot.
    ///
    /// The returned `next_state` is the raw slot content, which is stale when
    /// the transition is terminal.
    pub fn get(&self, slot: usize) -> Option<Transition> {
        if slot >= self.capacity {
            return None;
        }
        let range = self.state_range(slot);
        Some(Transition {
            state: State::new(self.hist_size, self.dim, self.states[range.clone()].to_vec())
                .ok()?,
            action: self.actions[slot],
            reward: self.rewards[slot],
            next_state: State::new(self.hist_size, self.dim, self.next_states[range].to_vec())
                .ok()?,
            terminal: self.terminal[slot],
        })
    }
}
