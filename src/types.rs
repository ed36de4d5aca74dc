use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Minimum number of polygon vertices for a detection to be kept.
pub const MIN_POLYGON_VERTICES: usize = 10;

/// Label reported when the classifier was never loaded.
pub const LABEL_UNAVAILABLE: &str = "Modelo no disponible";

/// Label reported when classification of a single image failed.
pub const LABEL_ERROR: &str = "Error";

/// Outcome of one classification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    /// Percentage in `[0, 100]`.
    pub confidence: f32,
}

impl ClassificationResult {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 100.0),
        }
    }

    pub fn unavailable() -> Self {
        Self::new(LABEL_UNAVAILABLE, 0.0)
    }

    pub fn error() -> Self {
        Self::new(LABEL_ERROR, 0.0)
    }
}

/// One object instance found by the segmentation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub class_id: usize,
    /// Probability-like score in `[0, 1]`.
    pub confidence: f32,
    /// Outer boundary of the instance mask in original image pixels.
    pub polygon: Vec<Point>,
}

impl Detection {
    pub fn new(label: impl Into<String>, class_id: usize, confidence: f32, polygon: Vec<Point>) -> Self {
        Self {
            label: label.into(),
            class_id,
            confidence: confidence.clamp(0.0, 1.0),
            polygon,
        }
    }

    /// Masks with too few vertices cannot be scored for overlap.
    pub fn is_degenerate(&self) -> bool {
        self.polygon.len() < MIN_POLYGON_VERTICES
    }
}
