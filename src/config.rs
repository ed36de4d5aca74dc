//! Typed configuration for model locations and pipeline thresholds.
//!
//! Every value has a default matching the deployed tomato models. The binary overrides them
//! from command-line flags or environment variables.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dedup::DedupConfig;
use crate::preprocess::TensorLayout;

/// Training-time label order of the ripeness classifier.
pub const DEFAULT_CLASS_NAMES: [&str; 4] = ["Damaged", "Old", "Ripe", "Unripe"];

/// Where the model artifacts live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Instance-segmentation detector.
    pub detector: PathBuf,
    /// Complete classifier model, tried first.
    pub classifier: PathBuf,
    /// Classifier graph without embedded weights.
    pub classifier_architecture: PathBuf,
    /// External weights referenced by `classifier_architecture`.
    pub classifier_weights: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            detector: PathBuf::from("models/tomato_seg.onnx"),
            classifier: PathBuf::from("models/tomato_classifier.onnx"),
            classifier_architecture: PathBuf::from("models/tomato_classifier_arch.onnx"),
            classifier_weights: PathBuf::from("models/tomato_classifier_arch.onnx.data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Label vocabulary in model output order.
    pub labels: Vec<String>,
    /// Square input resolution.
    pub input_size: u32,
    pub layout: TensorLayout,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            labels: DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            input_size: 224,
            layout: TensorLayout::Nhwc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Square letterbox input resolution.
    pub input_size: u32,
    /// Minimum class score for a raw candidate.
    pub confidence: f32,
    /// Box IoU used by the detector's own class-aware suppression.
    pub iou: f32,
    /// Maximum candidates kept per image.
    pub max_detections: usize,
    /// Mask probability above which a pixel belongs to the instance.
    pub mask_threshold: f32,
    /// Gray level of the letterbox padding.
    pub pad_value: u8,
    /// Used when the model carries no class names of its own.
    pub labels: Vec<String>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence: 0.5,
            iou: 0.3,
            max_detections: 5,
            mask_threshold: 0.5,
            pad_value: 114,
            labels: Vec::new(),
        }
    }
}

/// Everything the analyzer needs at start-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub models: ModelConfig,
    pub classifier: ClassifierConfig,
    pub segmentation: SegmentationConfig,
    pub dedup: DedupConfig,
    /// Run inference on CUDA instead of the CPU.
    pub cuda: bool,
}
