use std::path::Path;

use crate::config::SegmentationConfig;
use crate::dedup::{DedupConfig, deduplicate};
use crate::error::Result;
use crate::mapping::LabelTable;
use crate::model::InferenceBackend;
use crate::postprocess::{
    SegmentationOutputs, candidate_mask, decode_candidates, mask_polygon, non_maximum_suppression,
};
use crate::preprocess::{letterbox_tensor, load_rgb};
use crate::types::{Detection, MIN_POLYGON_VERTICES};

/// Instance segmentation followed by duplicate removal.
#[derive(Debug, Clone)]
pub struct SegmentationPipeline {
    config: SegmentationConfig,
    dedup: DedupConfig,
    fallback_labels: LabelTable,
}

impl SegmentationPipeline {
    pub fn new(config: SegmentationConfig, dedup: DedupConfig) -> Self {
        let fallback_labels = LabelTable::from_ordered(&config.labels);
        Self {
            config,
            dedup,
            fallback_labels,
        }
    }

    /// Detect objects in an image.
    ///
    /// Returns an empty list when no detector is loaded. Decode and inference failures are
    /// returned to the caller.
    pub fn detect(&self, model: Option<&dyn InferenceBackend>, image_path: &Path) -> Result<Vec<Detection>> {
        let Some(model) = model else {
            tracing::debug!("detector unavailable, returning no detections");
            return Ok(Vec::new());
        };

        let raw = self.detect_raw(model, image_path)?;
        let found = raw.len();
        let detections = deduplicate(raw, &self.dedup);
        tracing::debug!(
            path = %image_path.display(),
            raw = found,
            kept = detections.len(),
            "segmentation finished"
        );
        Ok(detections)
    }

    /// Detections before duplicate removal, degenerate masks already discarded.
    pub fn detect_raw(&self, model: &dyn InferenceBackend, image_path: &Path) -> Result<Vec<Detection>> {
        // 1. Decode and letterbox
        let image = load_rgb(image_path)?;
        let (input, letterbox) =
            letterbox_tensor(&image, self.config.input_size, self.config.pad_value)?;

        // 2. Forward pass
        let labels = model
            .labels()
            .filter(|table| !table.is_empty())
            .unwrap_or(&self.fallback_labels);
        let known_classes = (!labels.is_empty()).then(|| labels.len());
        let outputs =
            SegmentationOutputs::from_outputs(model.run(input.into_dyn())?, known_classes)?;

        // 3. Candidates, class-aware suppression and the per-image cap
        let candidates = decode_candidates(
            outputs.predictions.view(),
            outputs.num_classes(),
            self.config.confidence,
        );
        let candidates =
            non_maximum_suppression(candidates, self.config.iou, self.config.max_detections);

        // 4. Masks to polygons
        let mut detections = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let mask = candidate_mask(
                &candidate,
                outputs.prototypes.view(),
                self.config.input_size,
                self.config.mask_threshold,
            )?;
            let polygon = mask_polygon(&mask, &letterbox);
            if polygon.len() < MIN_POLYGON_VERTICES {
                tracing::debug!(
                    class_id = candidate.class_id,
                    vertices = polygon.len(),
                    "discarding degenerate mask"
                );
                continue;
            }
            detections.push(Detection::new(
                labels.label(candidate.class_id),
                candidate.class_id,
                candidate.confidence,
                polygon,
            ));
        }
        Ok(detections)
    }
}
