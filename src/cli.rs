use std::path::PathBuf;

use clap::Parser;

use crate::config::{AnalyzerConfig, ClassifierConfig, ModelConfig, SegmentationConfig};
use crate::dedup::DedupConfig;
use crate::mapping::load_labels;
use crate::preprocess::TensorLayout;
use crate::service::AnalysisMode;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "Tomato ripeness classification and segmentation", long_about = None)]
pub struct Args {
    /// image path
    #[arg(long, required = true)]
    pub source: PathBuf,

    /// Which analysis to run
    #[arg(long, value_enum, default_value_t = AnalysisMode::Classification)]
    pub mode: AnalysisMode,

    /// Write an annotated copy of the image here (segmentation only)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Instance segmentation ONNX model
    #[arg(long, env = "TOMATO_SCAN_DETECTOR", default_value = "models/tomato_seg.onnx")]
    pub detector: PathBuf,

    /// Complete classifier ONNX model
    #[arg(long, env = "TOMATO_SCAN_CLASSIFIER", default_value = "models/tomato_classifier.onnx")]
    pub classifier: PathBuf,

    /// Classifier graph without weights, used when the complete model is unusable
    #[arg(
        long,
        env = "TOMATO_SCAN_CLASSIFIER_ARCH",
        default_value = "models/tomato_classifier_arch.onnx"
    )]
    pub classifier_arch: PathBuf,

    /// External weights for the classifier graph
    #[arg(
        long,
        env = "TOMATO_SCAN_CLASSIFIER_WEIGHTS",
        default_value = "models/tomato_classifier_arch.onnx.data"
    )]
    pub classifier_weights: PathBuf,

    /// Classifier labels, one per line in training order
    #[arg(long, env = "TOMATO_SCAN_LABELS")]
    pub labels: Option<PathBuf>,

    /// Detector labels used when the model has no embedded class names
    #[arg(long, env = "TOMATO_SCAN_DETECTOR_LABELS")]
    pub detector_labels: Option<PathBuf>,

    #[arg(
        long,
        env = "TOMATO_SCAN_CLASSIFIER_SIZE",
        default_value_t = 224,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub classifier_size: u32,

    #[arg(long, value_enum, env = "TOMATO_SCAN_CLASSIFIER_LAYOUT", default_value_t = TensorLayout::Nhwc)]
    pub classifier_layout: TensorLayout,

    #[arg(
        long,
        env = "TOMATO_SCAN_DETECTOR_SIZE",
        default_value_t = 640,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub detector_size: u32,

    /// Minimum confidence of a raw detection
    #[arg(long, env = "TOMATO_SCAN_CONFIDENCE", default_value_t = 0.5)]
    pub confidence: f32,

    /// Box IoU for the detector's own suppression
    #[arg(long, env = "TOMATO_SCAN_NMS_IOU", default_value_t = 0.3)]
    pub nms_iou: f32,

    #[arg(long, env = "TOMATO_SCAN_MAX_DETECTIONS", default_value_t = 5)]
    pub max_detections: usize,

    #[arg(long, env = "TOMATO_SCAN_MASK_THRESHOLD", default_value_t = 0.5)]
    pub mask_threshold: f32,

    /// Mask overlap above which two detections are duplicates
    #[arg(long, env = "TOMATO_SCAN_DUPLICATE_IOU", default_value_t = 0.4)]
    pub duplicate_iou: f32,

    /// Centroid distance in pixels for the duplicate fallback
    #[arg(long, env = "TOMATO_SCAN_CENTROID_DISTANCE", default_value_t = 50.0)]
    pub centroid_distance: f32,

    #[arg(long, env = "TOMATO_SCAN_CUDA")]
    pub cuda: bool,
}

impl Args {
    /// Resolve the flags into an analyzer configuration, reading label files if given.
    pub fn to_config(&self) -> std::io::Result<AnalyzerConfig> {
        let mut classifier = ClassifierConfig {
            input_size: self.classifier_size,
            layout: self.classifier_layout,
            ..ClassifierConfig::default()
        };
        if let Some(path) = &self.labels {
            classifier.labels = load_labels(path)?;
        }

        let mut segmentation = SegmentationConfig {
            input_size: self.detector_size,
            confidence: self.confidence,
            iou: self.nms_iou,
            max_detections: self.max_detections,
            mask_threshold: self.mask_threshold,
            ..SegmentationConfig::default()
        };
        if let Some(path) = &self.detector_labels {
            segmentation.labels = load_labels(path)?;
        }

        Ok(AnalyzerConfig {
            models: ModelConfig {
                detector: self.detector.clone(),
                classifier: self.classifier.clone(),
                classifier_architecture: self.classifier_arch.clone(),
                classifier_weights: self.classifier_weights.clone(),
            },
            classifier,
            segmentation,
            dedup: DedupConfig {
                iou_threshold: self.duplicate_iou,
                centroid_distance: self.centroid_distance,
            },
            cuda: self.cuda,
        })
    }
}
