//! Fixed-capacity circular replay buffer.
//!
//! Transitions are written at slot `time % capacity`, where `time` is the
//! absolute step counter owned by the caller. Once `time` exceeds the capacity,
//! the oldest transition is overwritten.
mod base;
mod batch;
mod config;
mod transition;
pub use base::ReplayBuffer;
pub use batch::TransitionBatch;
pub use config::ReplayBufferConfig;
pub use transition::Transition;
