use crate::DType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unsupported media type: {0:?}")]
    UnsupportedMediaType(String),

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload is not valid UTF-8 text")]
    InvalidText,

    #[error("Invalid numeric value {value:?} at row {row}, column {column}")]
    InvalidNumber {
        value: String,
        row: usize,
        column: usize,
    },

    #[error("Non-numeric value in payload: {0}")]
    NonNumeric(String),

    #[error("Array is not rectangular: {0}")]
    Ragged(String),

    #[error("Empty payload")]
    EmptyPayload,

    #[error("Invalid NPY data: {0}")]
    InvalidNpy(String),

    #[error("Unsupported NPY dtype {0:?}")]
    UnsupportedDtype(String),

    #[error("Cannot encode {dtype} array with shape {shape:?}: {reason}")]
    Unencodable {
        dtype: DType,
        shape: Vec<usize>,
        reason: &'static str,
    },

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl CodecError {
    pub fn is_unsupported_media_type(&self) -> bool {
        matches!(self, CodecError::UnsupportedMediaType(_))
    }
}
