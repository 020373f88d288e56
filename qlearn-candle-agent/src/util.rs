//! Utilities.
use anyhow::{Context, Result};
use candle_core::{DType, Tensor};
use candle_nn::VarMap;
use log::trace;
mod named_tensors;
pub use named_tensors::NamedTensors;

/// Sentinel added to the denominator of in-range TD errors in [`clip_td_error`].
const TD_GUARD: f64 = 1000.0;

/// Interface for handling input and output dimensions of a network configuration.
pub trait IoDim {
    /// Returns the input dimension.
    fn get_in_dim(&self) -> usize;

    /// Sets the input dimension.
    fn set_in_dim(&mut self, v: usize);

    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the output dimension.
    fn set_out_dim(&mut self, v: usize);
}

/// Copies values of variables in `src` into `dest`.
///
/// Variables are identified by their names. The storages stay independent:
/// later updates of `src` do not affect `dest`.
pub fn copy_varmap(dest: &VarMap, src: &VarMap) -> Result<()> {
    let dest = dest.data().lock().unwrap();
    let src = src.data().lock().unwrap();
    trace!("Copy {} variables", dest.len());

    for (name, v_dest) in dest.iter() {
        let v_src = src
            .get(name)
            .with_context(|| format!("Variable {} is not in the source", name))?;
        v_dest.set(v_src.as_tensor())?;
    }

    Ok(())
}

/// Clips TD errors elementwise into `[-1, 1]`.
///
/// Entries with `|td| <= 1` are kept, the others are replaced by `td / |td|`.
/// The two cases are selected with masks rather than branches, and the
/// denominator is computed from detached values with [`TD_GUARD`] added to the
/// in-range entries, so it never vanishes. The gradient with respect to `td`
/// is 1 inside the range and `1 / |td|` outside.
pub fn clip_td_error(td: &Tensor) -> Result<Tensor> {
    let td_data = td.detach();
    let abs = td_data.abs()?;
    let inside = abs.le(1.0)?.to_dtype(DType::F32)?;
    let outside = abs.gt(1.0)?.to_dtype(DType::F32)?;
    let denom = td_data.add(&inside.affine(TD_GUARD, 0.0)?)?.abs()?;

    let td_in = td.mul(&inside)?;
    let td_out = td.div(&denom)?.mul(&outside)?;
    Ok(td_in.add(&td_out)?)
}
