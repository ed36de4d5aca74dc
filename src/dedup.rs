//! Greedy, confidence-first removal of duplicate segmentation detections.
//!
//! The same physical object is often reported more than once by the detector. Detections are
//! visited from most to least confident and a detection is dropped when its mask overlaps an
//! already accepted one by more than the threshold.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::geometry::{DEFAULT_CENTROID_DISTANCE, overlap_score};
use crate::types::Detection;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Overlap score above which two detections are the same object.
    pub iou_threshold: f32,
    /// Pixel distance used by the centroid fallback of the overlap score.
    pub centroid_distance: f32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.4,
            centroid_distance: DEFAULT_CENTROID_DISTANCE,
        }
    }
}

/// Keep the most confident detection of every group of overlapping masks.
///
/// Equal confidences keep their input order. The result is ordered by descending confidence.
pub fn deduplicate(detections: Vec<Detection>, config: &DedupConfig) -> Vec<Detection> {
    if detections.len() <= 1 {
        return detections;
    }

    let mut ranked = detections;
    // Vec::sort_by_key is stable.
    ranked.sort_by_key(|d| Reverse(OrderedFloat(d.confidence)));

    let mut accepted: Vec<Detection> = Vec::with_capacity(ranked.len());
    for candidate in ranked {
        let duplicate = accepted.iter().any(|kept| {
            overlap_score(&candidate.polygon, &kept.polygon, config.centroid_distance)
                > config.iou_threshold
        });
        if duplicate {
            tracing::debug!(
                label = %candidate.label,
                confidence = candidate.confidence,
                "dropping duplicate detection"
            );
        } else {
            accepted.push(candidate);
        }
    }
    accepted
}
