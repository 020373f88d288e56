#![warn(missing_docs)]
//! Backend-independent components of a DQN agent.
//!
//! * [`ReplayBuffer`] stores transitions in a fixed-capacity circular buffer.
//! * [`State`] and [`FrameStack`] represent decision-time states made of
//!   stacked raw observation frames.
//! * [`ActionSet`] converts between action identifiers and output indices of
//!   Q-functions.
//! * [`record::Record`] carries diagnostics of training steps.
pub mod error;
pub mod record;
pub mod replay_buffer;

mod action;
mod state;
pub use action::{ActionId, ActionSet};
pub use error::QlearnError;
pub use replay_buffer::{ReplayBuffer, ReplayBufferConfig, Transition, TransitionBatch};
pub use state::{FrameStack, State, OBS_RANGE};
