use super::Model;
use crate::errors::ModelLoadError;
use codec::NumericArray;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::{DynValue, TensorRef},
};
use std::path::Path;
use std::sync::Mutex;

/// ONNX Runtime backend for estimators exported with `skl2onnx`.
///
/// The decoded array is fed as the first graph input with its own element
/// type; the first graph output (`label` for classifiers) is the prediction.
pub struct OnnxModel {
    // `Session::run` needs `&mut`, so concurrent requests take turns.
    session: Mutex<Session>,
}

impl OnnxModel {
    fn build_session(path: &Path) -> anyhow::Result<Session> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(path)?;
        Ok(session)
    }
}

impl Model for OnnxModel {
    fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let session = Self::build_session(path).map_err(|e| ModelLoadError::Deserialize {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        tracing::info!(path = %path.display(), "ONNX model loaded");
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    fn predict(&self, input: &NumericArray) -> anyhow::Result<NumericArray> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("ONNX session lock poisoned"))?;

        let outputs = match input {
            NumericArray::F32(a) => {
                session.run(ort::inputs![TensorRef::from_array_view(a.view())?])?
            }
            NumericArray::F64(a) => {
                session.run(ort::inputs![TensorRef::from_array_view(a.view())?])?
            }
            NumericArray::I32(a) => {
                session.run(ort::inputs![TensorRef::from_array_view(a.view())?])?
            }
            NumericArray::I64(a) => {
                session.run(ort::inputs![TensorRef::from_array_view(a.view())?])?
            }
        };

        extract_prediction(&outputs[0])
    }
}

fn extract_prediction(value: &DynValue) -> anyhow::Result<NumericArray> {
    if let Ok(labels) = value.try_extract_array::<i64>() {
        return Ok(NumericArray::I64(labels.into_owned()));
    }
    if let Ok(labels) = value.try_extract_array::<i32>() {
        return Ok(NumericArray::I32(labels.into_owned()));
    }
    if let Ok(values) = value.try_extract_array::<f32>() {
        return Ok(NumericArray::F32(values.into_owned()));
    }
    if let Ok(values) = value.try_extract_array::<f64>() {
        return Ok(NumericArray::F64(values.into_owned()));
    }
    anyhow::bail!("Model output is not a numeric tensor")
}
