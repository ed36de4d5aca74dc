use std::path::Path;

use ndarray::{ArrayD, Axis};
use thiserror::Error;

use crate::config::ClassifierConfig;
use crate::error::{ModelKind, VisionError};
use crate::model::InferenceBackend;
use crate::postprocess::argmax_and_max;
use crate::preprocess::{classifier_tensor, load_rgb};
use crate::types::ClassificationResult;

/// Why a classification produced no label.
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("classifier model unavailable")]
    Unavailable,

    #[error("could not decode image")]
    Decode(#[source] VisionError),

    #[error("classifier inference failed")]
    Inference(#[source] VisionError),
}

impl From<ClassifyError> for VisionError {
    fn from(err: ClassifyError) -> Self {
        match err {
            ClassifyError::Unavailable => VisionError::ModelUnavailable(ModelKind::Classifier),
            ClassifyError::Decode(inner) | ClassifyError::Inference(inner) => inner,
        }
    }
}

/// Whole-image ripeness classification.
#[derive(Debug, Clone)]
pub struct ClassificationPipeline {
    config: ClassifierConfig,
}

impl ClassificationPipeline {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify an image, mapping every failure to a sentinel result.
    ///
    /// Returns `("Modelo no disponible", 0.0)` without reading the image when no model is
    /// loaded, and `("Error", 0.0)` when decoding or inference fails.
    pub fn classify(&self, model: Option<&dyn InferenceBackend>, image_path: &Path) -> ClassificationResult {
        match self.try_classify(model, image_path) {
            Ok(result) => result,
            Err(ClassifyError::Unavailable) => ClassificationResult::unavailable(),
            Err(err) => {
                tracing::error!(
                    path = %image_path.display(),
                    error = %err,
                    source = ?std::error::Error::source(&err),
                    "classification failed"
                );
                ClassificationResult::error()
            }
        }
    }

    /// Classify an image, reporting which stage failed.
    pub fn try_classify(
        &self,
        model: Option<&dyn InferenceBackend>,
        image_path: &Path,
    ) -> Result<ClassificationResult, ClassifyError> {
        let model = model.ok_or(ClassifyError::Unavailable)?;

        // 1. Decode, force RGB and build the batch
        let image = load_rgb(image_path).map_err(ClassifyError::Decode)?;
        let batch = classifier_tensor(&image, self.config.input_size, self.config.layout)
            .map_err(ClassifyError::Decode)?;

        // 2. Forward pass
        let outputs = model
            .run(batch.into_dyn())
            .map_err(ClassifyError::Inference)?;
        let probabilities = outputs.into_iter().next().ok_or_else(|| {
            ClassifyError::Inference(VisionError::invalid_output("classifier returned no outputs"))
        })?;

        // 3. Pick the most likely label
        self.select(probabilities).map_err(ClassifyError::Inference)
    }

    fn select(&self, probabilities: ArrayD<f32>) -> Result<ClassificationResult, VisionError> {
        let row = match probabilities.ndim() {
            1 => probabilities,
            2 if probabilities.shape()[0] == 1 => probabilities.index_axis_move(Axis(0), 0),
            _ => {
                return Err(VisionError::invalid_output(format!(
                    "expected a single probability row, got shape {:?}",
                    probabilities.shape()
                )));
            }
        };
        if row.is_empty() {
            return Err(VisionError::invalid_output("empty probability row"));
        }

        let (index, probability) = argmax_and_max(row.iter().copied());
        let label = self.config.labels.get(index).ok_or_else(|| {
            VisionError::invalid_output(format!(
                "class index {index} outside the {} configured labels",
                self.config.labels.len()
            ))
        })?;
        if !probability.is_finite() {
            return Err(VisionError::invalid_output("non-finite class probability"));
        }
        Ok(ClassificationResult::new(label.clone(), probability * 100.0))
    }
}
