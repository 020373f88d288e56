//! Decision-time states built from stacked observation frames.
use crate::error::QlearnError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Dynamic range of raw observations.
///
/// Q-functions divide raw observation values by this constant before any
/// learned layer, both when training and when acting.
pub const OBS_RANGE: f64 = 255.0;

/// A window of `hist_size` observation frames, each of dimension `dim`.
///
/// Frames are stored row-major, oldest first, as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawState")]
pub struct State {
    hist_size: usize,
    dim: usize,
    data: Vec<u8>,
}

#[derive(Deserialize)]
struct RawState {
    hist_size: usize,
    dim: usize,
    data: Vec<u8>,
}

impl TryFrom<RawState> for State {
    type Error = QlearnError;

    fn try_from(raw: RawState) -> Result<Self, QlearnError> {
        if raw.data.len() != raw.hist_size * raw.dim {
            return Err(QlearnError::ShapeMismatch {
                expected: vec![raw.hist_size * raw.dim],
                got: vec![raw.data.len()],
            });
        }
        Ok(Self {
            hist_size: raw.hist_size,
            dim: raw.dim,
            data: raw.data,
        })
    }
}

impl State {
    /// Creates a state from raw data of length `hist_size * dim`.
    pub fn new(hist_size: usize, dim: usize, data: Vec<u8>) -> Result<Self> {
        Ok(Self::try_from(RawState {
            hist_size,
            dim,
            data,
        })?)
    }

    /// All-zero state.
    pub fn zeros(hist_size: usize, dim: usize) -> Self {
        Self {
            hist_size,
            dim,
            data: vec![0; hist_size * dim],
        }
    }

    /// Returns `[hist_size, dim]`.
    pub fn shape(&self) -> [usize; 2] {
        [self.hist_size, self.dim]
    }

    /// Raw data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the `j`-th frame, `0` being the oldest.
    pub fn frame(&self, j: usize) -> &[u8] {
        &self.data[j * self.dim..(j + 1) * self.dim]
    }

    /// Fails with [`QlearnError::ShapeMismatch`] unless the state has the given shape.
    pub fn check_shape(&self, hist_size: usize, dim: usize) -> Result<(), QlearnError> {
        if self.hist_size != hist_size || self.dim != dim {
            return Err(QlearnError::ShapeMismatch {
                expected: vec![hist_size, dim],
                got: vec![self.hist_size, self.dim],
            });
        }
        Ok(())
    }
}

/// Stacks the latest `hist_size` observation frames.
#[derive(Debug, Clone)]
pub struct FrameStack {
    state: State,
}

impl FrameStack {
    /// Creates a frame stack filled with zeros.
    ///
    /// Fails with [`QlearnError::InvalidConfig`] if `hist_size` or `dim` is zero.
    pub fn new(hist_size: usize, dim: usize) -> Result<Self> {
        if hist_size == 0 || dim == 0 {
            return Err(QlearnError::InvalidConfig(format!(
                "frame stack shape must be positive: [{}, {}]",
                hist_size, dim
            ))
            .into());
        }
        Ok(Self {
            state: State::zeros(hist_size, dim),
        })
    }

    fn check_frame(&self, frame: &[u8]) -> Result<()> {
        if frame.len() != self.state.dim {
            return Err(QlearnError::ShapeMismatch {
                expected: vec![self.state.dim],
                got: vec![frame.len()],
            }
            .into());
        }
        Ok(())
    }

    /// Appends the newest frame, dropping the oldest one.
    pub fn push(&mut self, frame: &[u8]) -> Result<()> {
        self.check_frame(frame)?;
        let dim = self.state.dim;
        let n = self.state.data.len();
        self.state.data.copy_within(dim.., 0);
        self.state.data[n - dim..].copy_from_slice(frame);
        Ok(())
    }

    /// Fills all frames with the given one, used at the start of an episode.
    pub fn fill(&mut self, frame: &[u8]) -> Result<()> {
        self.check_frame(frame)?;
        for chunk in self.state.data.chunks_mut(self.state.dim) {
            chunk.copy_from_slice(frame);
        }
        Ok(())
    }

    /// Returns the current state.
    pub fn state(&self) -> State {
        self.state.clone()
    }
}
