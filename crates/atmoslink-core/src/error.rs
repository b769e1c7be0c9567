//! Error types for model construction, calculation and export.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by the data sources and the model family.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The model needs an explicit calculation step before it can be queried.
    #[error("model '{model}' has not been calculated yet")]
    NotCalculated { model: &'static str },

    /// The model does not own raw transmittance samples.
    #[error("model '{model}' does not hold transmittance samples")]
    NotLoaded { model: &'static str },

    /// An expected input file or directory is absent.
    #[error("missing input data: {}", path.display())]
    MissingData { path: PathBuf },

    /// Aperture sets, bin edges or array lengths disagree.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A table could not be parsed.
    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// Samples for an aperture span no range, so no bin edges exist.
    #[error("transmittance samples for aperture {aperture} span an empty range")]
    DegenerateSamples { aperture: f64 },

    /// A model parameter is out of its domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A channel worker thread panicked.
    #[error("worker for channel '{channel}' panicked")]
    WorkerPanicked { channel: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Map an I/O error on `path` to [`ModelError::MissingData`] when the
    /// file is absent.
    pub(crate) fn from_io(path: &std::path::Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::MissingData {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io(err)
        }
    }
}
