//! Types for recording diagnostics of training steps.
//!
//! Operations of the agent return a [`Record`], a map from names to
//! [`RecordValue`]s, which the caller may log or aggregate.
//!
//! ```rust
//! use qlearn_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("loss", 0.5);
//! record.insert("q_values", RecordValue::Array1(vec![0.1, 0.2]));
//! assert_eq!(record.get_scalar("loss").unwrap(), 0.5);
//! ```
mod base;

pub use base::{Record, RecordValue};
