use crate::errors::ModelLoadError;
use codec::NumericArray;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod linear;

#[cfg(feature = "onnx")]
pub mod ort;

/// File name of the portable linear-estimator artifact.
pub const LINEAR_ARTIFACT: &str = "model.json";

/// Extension of ONNX artifacts.
pub const ONNX_EXTENSION: &str = "onnx";

/// An in-memory model handle.
///
/// Handles are shared read-only between concurrent requests, so `predict`
/// takes `&self` and implementations must be `Send + Sync`.
pub trait Model: Send + Sync {
    fn load(path: &Path) -> Result<Self, ModelLoadError>
    where
        Self: Sized;

    /// Run the model on a decoded input array.
    fn predict(&self, input: &NumericArray) -> anyhow::Result<NumericArray>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Onnx(PathBuf),
    Linear(PathBuf),
}

/// Locates the model artifact inside `model_dir`.
///
/// The first `*.onnx` file (lexical order) wins over `model.json`.
pub fn find_artifact(model_dir: &Path) -> Result<Artifact, ModelLoadError> {
    if !model_dir.is_dir() {
        return Err(ModelLoadError::DirectoryNotFound(model_dir.to_path_buf()));
    }

    let io_error = |source| ModelLoadError::Io {
        path: model_dir.to_path_buf(),
        source,
    };

    let mut files = fs::read_dir(model_dir)
        .map_err(io_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)?;
    files.retain(|path| path.is_file());
    files.sort();

    if let Some(onnx) = files
        .iter()
        .find(|path| path.extension().is_some_and(|ext| ext == ONNX_EXTENSION))
    {
        return Ok(Artifact::Onnx(onnx.clone()));
    }

    files
        .into_iter()
        .find(|path| path.file_name().is_some_and(|name| name == LINEAR_ARTIFACT))
        .map(Artifact::Linear)
        .ok_or_else(|| ModelLoadError::ArtifactNotFound(model_dir.to_path_buf()))
}

/// Loads the model found in `model_dir` with the matching backend.
pub fn load_model(model_dir: &Path) -> Result<Arc<dyn Model>, ModelLoadError> {
    let artifact = find_artifact(model_dir)?;
    tracing::info!(artifact = ?artifact, "Loading model artifact");

    match artifact {
        Artifact::Linear(path) => Ok(Arc::new(linear::LinearModel::load(&path)?)),
        #[cfg(feature = "onnx")]
        Artifact::Onnx(path) => Ok(Arc::new(self::ort::OnnxModel::load(&path)?)),
        #[cfg(not(feature = "onnx"))]
        Artifact::Onnx(path) => Err(ModelLoadError::UnsupportedArtifact {
            path,
            reason: "ONNX support requires the `onnx` feature".to_string(),
        }),
    }
}
