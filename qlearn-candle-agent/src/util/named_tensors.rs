use anyhow::{ensure, Context, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use qlearn_core::QlearnError;
use std::collections::HashMap;

/// Named tensors holding a value copy of model parameters.
///
/// The tensors do not share storage with the variables they were copied from.
#[derive(Debug, Clone)]
pub struct NamedTensors {
    pub named_tensors: HashMap<String, Tensor>,
}

impl NamedTensors {
    /// Copies data of [`VarMap`] into new storages.
    pub fn copy_from(vs: &VarMap) -> Result<Self> {
        let src = vs.data().lock().unwrap();
        let named_tensors = src
            .iter()
            .map(|(k, v)| -> Result<(String, Tensor)> {
                Ok((k.clone(), v.as_tensor().detach().copy()?))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { named_tensors })
    }

    /// Copies named tensors into the variables of [`VarMap`] with the same names.
    ///
    /// Every variable of `vs` must have a counterpart of the same shape. All
    /// names and shapes are checked before any variable is written, so `vs` is
    /// left untouched on error.
    pub fn copy_to(&self, vs: &VarMap) -> Result<()> {
        let dest = vs.data().lock().unwrap();
        ensure!(
            dest.len() == self.named_tensors.len(),
            "{} tensors given for {} variables",
            self.named_tensors.len(),
            dest.len()
        );

        let mut pairs = Vec::with_capacity(dest.len());
        for (name, var) in dest.iter() {
            let src = self
                .named_tensors
                .get(name)
                .with_context(|| format!("No tensor for variable {}", name))?;
            if src.dims() != var.dims() {
                return Err(QlearnError::ShapeMismatch {
                    expected: var.dims().to_vec(),
                    got: src.dims().to_vec(),
                }
                .into());
            }
            pairs.push((var, src.to_device(var.device())?));
        }

        for (var, src) in pairs {
            var.set(&src)?;
        }

        Ok(())
    }

    /// Moves all tensors to the given device.
    pub fn to_device(&self, device: &Device) -> Result<Self> {
        let named_tensors = self
            .named_tensors
            .iter()
            .map(|(k, v)| -> Result<(String, Tensor)> { Ok((k.clone(), v.to_device(device)?)) })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { named_tensors })
    }

    /// Returns the largest absolute difference over all elements.
    ///
    /// Both sets must have the same names and shapes.
    pub fn max_abs_diff(&self, other: &Self) -> Result<f32> {
        ensure!(
            self.named_tensors.len() == other.named_tensors.len(),
            "Different number of tensors"
        );
        let mut diff = 0f32;
        for (name, t) in self.named_tensors.iter() {
            let o = other
                .named_tensors
                .get(name)
                .with_context(|| format!("No tensor named {}", name))?
                .to_device(t.device())?;
            let d = t.sub(&o)?.abs()?.flatten_all()?.max(0)?.to_scalar::<f32>()?;
            diff = diff.max(d);
        }
        Ok(diff)
    }
}
