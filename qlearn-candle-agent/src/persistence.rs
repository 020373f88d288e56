//! Snapshots of model parameters.
use crate::util::NamedTensors;
use anyhow::Result;
use candle_core::Device;
use log::{error, info};
use qlearn_core::QlearnError;
use std::{
    fmt::Display,
    fs,
    path::{Path, PathBuf},
};

/// Returns the identifier of the snapshot taken at `step`.
pub fn snapshot_id(step: usize) -> String {
    format!("{}model", step)
}

/// Storage of named snapshots of model parameters.
///
/// Errors are reported as [`QlearnError::PersistenceFailure`]. Failed
/// operations are not retried.
pub trait SnapshotStore {
    /// Stores `params` under `id`, replacing an existing snapshot.
    fn save(&self, id: &str, params: &NamedTensors) -> Result<()>;

    /// Returns the parameters stored under `id`.
    fn load(&self, id: &str) -> Result<NamedTensors>;
}

/// Stores each snapshot as a safetensors file `<dir>/<id>`.
#[derive(Debug, Clone)]
pub struct SafetensorsStore {
    dir: PathBuf,
}

impl SafetensorsStore {
    /// Creates a store in `dir`. The directory is created on the first save.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Returns the path of the snapshot `id`.
    pub fn path(&self, id: &str) -> PathBuf {
        self.dir.join(id)
    }
}

/// Logs a failed snapshot operation and converts it into
/// [`QlearnError::PersistenceFailure`].
pub(crate) fn failure(id: &str, reason: impl Display) -> anyhow::Error {
    error!("Snapshot {} failed: {}", id, reason);
    QlearnError::PersistenceFailure {
        id: id.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

impl SnapshotStore for SafetensorsStore {
    fn save(&self, id: &str, params: &NamedTensors) -> Result<()> {
        let path = self.path(id);
        fs::create_dir_all(&self.dir).map_err(|e| failure(id, e))?;
        let params = params.to_device(&Device::Cpu).map_err(|e| failure(id, e))?;
        candle_core::safetensors::save(&params.named_tensors, &path)
            .map_err(|e| failure(id, e))?;
        info!("Save snapshot to {:?}", path);
        Ok(())
    }

    fn load(&self, id: &str) -> Result<NamedTensors> {
        let path = self.path(id);
        let named_tensors =
            candle_core::safetensors::load(&path, &Device::Cpu).map_err(|e| failure(id, e))?;
        info!("Load snapshot from {:?}", path);
        Ok(NamedTensors { named_tensors })
    }
}
