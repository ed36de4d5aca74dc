//! Error types for model loading and inference.
//!
//! Loading failures ([`LoadError`]) never escape the registry: they are logged and the
//! affected model stays absent. Per-request failures ([`VisionError`]) are returned to the
//! caller of a pipeline, except where the pipeline defines a sentinel result.

use std::path::PathBuf;

use thiserror::Error;

/// Which of the two models an error or handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Classifier,
    Detector,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Classifier => write!(f, "classifier"),
            ModelKind::Detector => write!(f, "detector"),
        }
    }
}

/// Why a model artifact could not be turned into a usable handle.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The artifact is not present at its configured path.
    #[error("artifact not found: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    /// The artifact exists but could not be deserialized into a session.
    #[error("artifact could not be loaded: {}", path.display())]
    ArtifactCorrupt {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl LoadError {
    pub fn corrupt(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        LoadError::ArtifactCorrupt {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, LoadError::ArtifactMissing { .. })
    }
}

/// Errors raised while analysing a single image.
#[derive(Error, Debug)]
pub enum VisionError {
    /// The model needed for this request was never loaded.
    #[error("{0} model unavailable")]
    ModelUnavailable(ModelKind),

    /// The input image could not be read or decoded.
    #[error("image load")]
    ImageLoad(#[from] image::ImageError),

    /// The request itself is malformed (bad extension, empty or oversized file).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// The inference runtime failed.
    #[error("inference")]
    Inference(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The model produced tensors of an unexpected shape or content.
    #[error("unexpected model output: {message}")]
    InvalidOutput { message: String },

    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    #[error("io")]
    Io(#[from] std::io::Error),
}

impl VisionError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        VisionError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        VisionError::InvalidOutput {
            message: message.into(),
        }
    }

    pub fn inference(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        VisionError::Inference(source.into())
    }

    /// `true` when the failure reflects a capability that stays unavailable for the
    /// lifetime of the process, as opposed to a problem with this one request.
    pub fn is_degraded(&self) -> bool {
        matches!(self, VisionError::ModelUnavailable(_))
    }
}

impl From<ort::Error> for VisionError {
    fn from(err: ort::Error) -> Self {
        VisionError::Inference(Box::new(err))
    }
}

/// Failure of the primary geometric overlap computation.
///
/// Never surfaced outside the geometry module; the caller falls back to centroid distance.
#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("polygon is not a valid simple polygon")]
    InvalidPolygon,

    #[error("polygon boolean operation failed")]
    Clipping(#[from] clipper2::ClipperError),
}

pub type Result<T> = std::result::Result<T, VisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_model_is_degraded() {
        assert!(VisionError::ModelUnavailable(ModelKind::Detector).is_degraded());
        assert!(!VisionError::invalid_input("empty file").is_degraded());
    }

    #[test]
    fn load_error_messages_name_the_path() {
        let err = LoadError::ArtifactMissing {
            path: PathBuf::from("models/classifier.onnx"),
        };
        assert!(err.is_missing());
        assert_eq!(err.to_string(), "artifact not found: models/classifier.onnx");
    }
}
