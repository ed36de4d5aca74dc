use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::ClassificationPipeline;
use crate::config::AnalyzerConfig;
use crate::error::Result;
use crate::model::{ModelLoader, OnnxModel};
use crate::registry::ModelRegistry;
use crate::segment::SegmentationPipeline;
use crate::types::{ClassificationResult, Detection};
use crate::utils::validate_image;

/// Which pipeline a request runs. Exactly one runs per request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Whole-image ripeness label.
    #[default]
    Classification,
    /// Per-tomato masks and labels.
    Segmentation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub image_path: PathBuf,
    pub mode: AnalysisMode,
}

impl AnalysisRequest {
    pub fn new(image_path: impl Into<PathBuf>, mode: AnalysisMode) -> Self {
        Self {
            image_path: image_path.into(),
            mode,
        }
    }
}

/// Result of one analysis, shaped for storage or display by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub mode: AnalysisMode,
    pub analyzed_at: DateTime<Utc>,
    pub image: PathBuf,
    /// Empty in classification mode.
    pub detections: Vec<Detection>,
    /// `None` in segmentation mode.
    pub classification: Option<ClassificationResult>,
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Entry point owning the loaded models and both pipelines.
///
/// Models are loaded by the constructor, so no request can run before loading finishes.
/// The analyzer is `Send + Sync`; each model serializes its own inference calls.
#[derive(Debug)]
pub struct Analyzer {
    registry: ModelRegistry,
    classification: ClassificationPipeline,
    segmentation: SegmentationPipeline,
}

impl Analyzer {
    /// Load the ONNX models named in `config` and build the pipelines.
    pub fn new(config: AnalyzerConfig) -> Self {
        let loader = OnnxModel::new(config.cuda);
        Self::with_loader(config, &loader)
    }

    pub fn with_loader(config: AnalyzerConfig, loader: &dyn ModelLoader) -> Self {
        let registry = ModelRegistry::initialize(&config.models, loader);
        Self::from_registry(registry, config)
    }

    pub fn from_registry(registry: ModelRegistry, config: AnalyzerConfig) -> Self {
        Self {
            registry,
            classification: ClassificationPipeline::new(config.classifier),
            segmentation: SegmentationPipeline::new(config.segmentation, config.dedup),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Never fails; see [`ClassificationPipeline::classify`].
    pub fn classify(&self, image_path: &Path) -> ClassificationResult {
        self.classification
            .classify(self.registry.classifier(), image_path)
    }

    pub fn detect(&self, image_path: &Path) -> Result<Vec<Detection>> {
        self.segmentation.detect(self.registry.detector(), image_path)
    }

    /// Validate the image and run the pipeline selected by the request mode.
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport> {
        validate_image(&request.image_path)?;
        tracing::info!(path = %request.image_path.display(), mode = ?request.mode, "analyzing image");

        let (detections, classification) = match request.mode {
            AnalysisMode::Segmentation => {
                let detections = self
                    .detect(&request.image_path)?
                    .into_iter()
                    .map(|d| Detection {
                        confidence: round2(d.confidence),
                        ..d
                    })
                    .collect();
                (detections, None)
            }
            AnalysisMode::Classification => {
                let result = self.classify(&request.image_path);
                let rounded = ClassificationResult {
                    confidence: round2(result.confidence),
                    ..result
                };
                (Vec::new(), Some(rounded))
            }
        };

        Ok(AnalysisReport {
            mode: request.mode,
            analyzed_at: Utc::now(),
            image: request.image_path.clone(),
            detections,
            classification,
        })
    }
}
