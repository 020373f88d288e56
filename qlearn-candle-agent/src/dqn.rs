//! DQN agent.
mod base;
mod config;
mod explorer;
mod loss;
mod model;
pub use base::Dqn;
pub use config::DqnConfig;
pub use explorer::{argmax, epsilon_greedy_index, EpsilonGreedy};
pub use loss::{bellman_target, target_matrix, td_loss};
pub use model::{DqnModel, DqnModelConfig};
