use codec::CodecError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn a model directory into a model handle.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("Model directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("No model artifact found in {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to deserialize model artifact {}: {reason}", path.display())]
    Deserialize { path: PathBuf, reason: String },

    #[error("Unsupported model artifact {}: {reason}", path.display())]
    UnsupportedArtifact { path: PathBuf, reason: String },
}

impl ModelLoadError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ModelLoadError::DirectoryNotFound(_) | ModelLoadError::ArtifactNotFound(_)
        )
    }
}

/// Failure while handling a single inference request.
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("Unsupported media type: {0:?}")]
    UnsupportedMediaType(String),

    #[error("Failed to decode request: {0}")]
    Decode(#[source] CodecError),

    /// Raised by the model; carried through unchanged.
    #[error(transparent)]
    Prediction(#[from] anyhow::Error),

    #[error("Failed to encode response: {0}")]
    Encode(#[source] CodecError),
}

impl InvocationError {
    pub fn decode(err: CodecError) -> Self {
        match err {
            CodecError::UnsupportedMediaType(media_type) => Self::UnsupportedMediaType(media_type),
            other => Self::Decode(other),
        }
    }

    pub fn encode(err: CodecError) -> Self {
        match err {
            CodecError::UnsupportedMediaType(media_type) => Self::UnsupportedMediaType(media_type),
            other => Self::Encode(other),
        }
    }
}

/// Multi-model store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("Model already loaded: {0}")]
    AlreadyLoaded(String),

    #[error(transparent)]
    Load(#[from] ModelLoadError),
}
