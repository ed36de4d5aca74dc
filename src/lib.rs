//! Tomato ripeness analysis on top of two pretrained ONNX models.
//!
//! A whole-image classifier assigns a ripeness label, and an instance-segmentation detector
//! outlines individual tomatoes. [`Analyzer`] loads both once and runs one of them per request,
//! chosen by [`AnalysisMode`]. Missing or corrupt models put the matching pipeline in degraded
//! mode instead of failing start-up.

pub mod classify;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod error;
pub mod geometry;
pub mod helpers;
pub mod mapping;
pub mod model;
pub mod postprocess;
pub mod preprocess;
pub mod registry;
pub mod segment;
pub mod service;
pub mod types;
pub mod utils;

pub use crate::classify::{ClassificationPipeline, ClassifyError};
pub use crate::cli::Args;
pub use crate::config::{AnalyzerConfig, ClassifierConfig, ModelConfig, SegmentationConfig};
pub use crate::dedup::{DedupConfig, deduplicate};
pub use crate::error::{GeometryError, LoadError, ModelKind, VisionError};
pub use crate::geometry::{Point, overlap_score};
pub use crate::helpers::draw_detections;
pub use crate::mapping::{LabelTable, load_labels};
pub use crate::model::{InferenceBackend, ModelLoader, OnnxModel};
pub use crate::registry::{LoadStrategy, ModelRegistry, RegistryStatus};
pub use crate::segment::SegmentationPipeline;
pub use crate::service::{AnalysisMode, AnalysisReport, AnalysisRequest, Analyzer};
pub use crate::types::{ClassificationResult, Detection};
