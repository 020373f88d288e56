//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum QlearnError {
    /// Sampling was requested before any transition was recorded.
    #[error("Insufficient history: cannot sample a batch at time {0}")]
    InsufficientHistory(usize),

    /// A state or a batch does not match the configured shape.
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Given shape.
        got: Vec<usize>,
    },

    /// Writing or reading a snapshot failed.
    #[error("Persistence failure for snapshot {id}: {reason}")]
    PersistenceFailure {
        /// Identifier of the snapshot.
        id: String,
        /// Description of the underlying failure.
        reason: String,
    },

    /// The action is not in the action set.
    #[error("Unknown action: {0}")]
    UnknownAction(i64),

    /// The action index is out of the range of the action set.
    #[error("Action index {index} is out of range for {n_actions} actions")]
    ActionIndexOutOfRange {
        /// Given index.
        index: usize,
        /// The number of actions.
        n_actions: usize,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}
