//! Exploration strategies of DQN.
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Epsilon-greedy explorer for DQN.
///
/// Epsilon decays linearly from `eps_start` to `eps_final` over `final_step`
/// steps and stays at `eps_final` afterwards.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    pub eps_start: f64,
    pub eps_final: f64,
    pub final_step: usize,
}

impl Default for EpsilonGreedy {
    fn default() -> Self {
        Self {
            eps_start: 1.0,
            eps_final: 0.1,
            final_step: 1_000_000,
        }
    }
}

impl EpsilonGreedy {
    /// Constructs epsilon-greedy explorer with the given decay length.
    pub fn with_final_step(final_step: usize) -> Self {
        Self {
            final_step,
            ..Self::default()
        }
    }

    /// Set the epsilon value at the final step.
    pub fn eps_final(self, v: f64) -> Self {
        let mut s = self;
        s.eps_final = v;
        s
    }

    /// Set the epsilon value at the start.
    pub fn eps_start(self, v: f64) -> Self {
        let mut s = self;
        s.eps_start = v;
        s
    }

    /// Returns epsilon at the given step.
    pub fn epsilon(&self, step: usize) -> f64 {
        if self.final_step == 0 {
            return self.eps_final;
        }
        let d = (self.eps_start - self.eps_final) / (self.final_step as f64);
        let eps = self.eps_start - d * step.min(self.final_step) as f64;
        if self.eps_start >= self.eps_final {
            eps.max(self.eps_final)
        } else {
            eps.min(self.eps_final)
        }
    }
}

/// Returns the index of the first maximal value.
///
/// `q` must not be empty.
pub fn argmax(q: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in q.iter().enumerate().skip(1) {
        if *v > q[best] {
            best = i;
        }
    }
    best
}

/// Takes a uniformly random index with probability `epsilon`, otherwise the
/// greedy one.
///
/// No random number is drawn when `epsilon <= 0`.
pub fn epsilon_greedy_index(q: &[f32], epsilon: f64, rng: &mut impl Rng) -> usize {
    if epsilon > 0.0 && rng.gen::<f64>() < epsilon {
        rng.gen_range(0..q.len())
    } else {
        argmax(q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_epsilon_schedule() {
        let explorer = EpsilonGreedy::with_final_step(100)
            .eps_start(1.0)
            .eps_final(0.1);
        assert_eq!(explorer.epsilon(0), 1.0);
        assert!((explorer.epsilon(50) - 0.55).abs() < 1e-9);
        assert!((explorer.epsilon(100) - 0.1).abs() < 1e-9);
        assert!((explorer.epsilon(10_000) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_argmax_takes_first_maximum() {
        assert_eq!(argmax(&[0.0, 0.0, 0.0]), 0);
        assert_eq!(argmax(&[0.1, 0.5, 0.5, -1.0]), 1);
        assert_eq!(argmax(&[-3.0, -2.0, -2.5]), 1);
    }

    #[test]
    fn test_zero_epsilon_consumes_no_randomness() {
        let mut rng1 = SmallRng::seed_from_u64(7);
        let mut rng2 = SmallRng::seed_from_u64(7);
        for _ in 0..10 {
            assert_eq!(epsilon_greedy_index(&[0.2, 0.9, 0.1], 0.0, &mut rng1), 1);
        }
        assert_eq!(rng1.gen::<u64>(), rng2.gen::<u64>());
    }

    #[test]
    fn test_full_epsilon_is_uniform() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut counts = [0usize; 4];
        for _ in 0..4000 {
            counts[epsilon_greedy_index(&[9.0, 0.0, 0.0, 0.0], 1.0, &mut rng)] += 1;
        }
        assert!(counts.iter().all(|&c| c > 800 && c < 1200), "{:?}", counts);
    }
}
