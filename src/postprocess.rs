use std::cmp::Reverse;
use std::collections::HashMap;

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contours::{BorderType, find_contours};
use ndarray::{Array2, ArrayD, ArrayView2, ArrayView3, Axis, Ix3, Ix4};
use ordered_float::OrderedFloat;

use crate::error::{Result, VisionError};
use crate::geometry::Point;
use crate::preprocess::Letterbox;

/// Index and value of the largest element. Ties keep the first index.
pub fn argmax_and_max(values: impl IntoIterator<Item = f32>) -> (usize, f32) {
    values
        .into_iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(max_idx, max_val), (i, val)| {
            if val > max_val { (i, val) } else { (max_idx, max_val) }
        })
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Axis-aligned box in letterboxed input pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box from the `cx, cy, w, h` layout of YOLO heads.
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let overlap = BoundingBox::new(
            self.x1.max(other.x1),
            self.y1.max(other.y1),
            self.x2.min(other.x2),
            self.y2.min(other.y2),
        );
        let inter = overlap.area();
        let union = self.area() + other.area() - inter;
        if union > 0.0 { inter / union } else { 0.0 }
    }
}

/// One raw detector candidate in model input coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
    /// Mask prototype coefficients.
    pub coefficients: Vec<f32>,
}

/// The two tensors of a YOLO segmentation head.
#[derive(Debug)]
pub struct SegmentationOutputs {
    /// `[4 + classes + mask_dim, anchors]`.
    pub predictions: Array2<f32>,
    /// `[mask_dim, mask_height, mask_width]`.
    pub prototypes: ndarray::Array3<f32>,
}

impl SegmentationOutputs {
    /// Identify the prediction and prototype tensors by rank, in whichever order the
    /// model declares them.
    ///
    /// Predictions are read channels-first unless only the transposed reading fits the
    /// prototype count, or `num_classes` is known and only the transposed reading matches it.
    pub fn from_outputs(outputs: Vec<ArrayD<f32>>, num_classes: Option<usize>) -> Result<Self> {
        let mut predictions = None;
        let mut prototypes = None;
        for output in outputs {
            match output.ndim() {
                3 if predictions.is_none() => predictions = Some(output),
                4 if prototypes.is_none() => prototypes = Some(output),
                _ => {}
            }
        }
        let (Some(predictions), Some(prototypes)) = (predictions, prototypes) else {
            return Err(VisionError::invalid_output(
                "expected a 3-D prediction tensor and a 4-D mask prototype tensor",
            ));
        };

        let predictions = predictions.into_dimensionality::<Ix3>()?;
        let prototypes = prototypes.into_dimensionality::<Ix4>()?;
        let predictions = predictions.index_axis(Axis(0), 0);
        let prototypes = prototypes.index_axis(Axis(0), 0).to_owned();

        let mask_dim = prototypes.shape()[0];
        let (rows, cols) = (predictions.shape()[0], predictions.shape()[1]);
        let predictions = if is_anchor_major(rows, cols, mask_dim, num_classes) {
            predictions.t().to_owned()
        } else {
            predictions.to_owned()
        };

        if predictions.shape()[0] <= 4 + mask_dim {
            return Err(VisionError::invalid_output(format!(
                "prediction rows {} leave no room for classes with {} mask coefficients",
                predictions.shape()[0],
                mask_dim
            )));
        }
        Ok(Self {
            predictions,
            prototypes,
        })
    }

    pub fn num_anchors(&self) -> usize {
        self.predictions.shape()[1]
    }

    pub fn mask_dim(&self) -> usize {
        self.prototypes.shape()[0]
    }

    pub fn num_classes(&self) -> usize {
        self.predictions.shape()[0] - 4 - self.mask_dim()
    }
}

// Channels-first `[4 + classes + mask_dim, anchors]` is the Ultralytics export; some
// exporters emit `[anchors, 4 + classes + mask_dim]` instead.
fn is_anchor_major(rows: usize, cols: usize, mask_dim: usize, num_classes: Option<usize>) -> bool {
    let head = 4 + mask_dim;
    if rows <= head {
        return cols > head;
    }
    match num_classes {
        Some(classes) => cols == head + classes && rows != head + classes,
        None => false,
    }
}

/// Keep anchors whose best class score reaches `threshold`.
pub fn decode_candidates(predictions: ArrayView2<f32>, num_classes: usize, threshold: f32) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for anchor in predictions.axis_iter(Axis(1)) {
        let scores = anchor.slice(ndarray::s![4..4 + num_classes]);
        let (class_id, confidence) = argmax_and_max(scores.iter().copied());
        if !(confidence >= threshold) {
            continue;
        }
        candidates.push(Candidate {
            class_id,
            confidence,
            bbox: BoundingBox::from_center(anchor[0], anchor[1], anchor[2], anchor[3]),
            coefficients: anchor.slice(ndarray::s![4 + num_classes..]).to_vec(),
        });
    }
    candidates
}

/// Class-aware box suppression, keeping at most `max_detections` by descending confidence.
pub fn non_maximum_suppression(
    candidates: Vec<Candidate>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Candidate> {
    // Group indices by class id.
    let mut by_class: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, candidate) in candidates.iter().enumerate() {
        by_class.entry(candidate.class_id).or_default().push(i);
    }

    let mut keep_indices: Vec<usize> = Vec::new();
    for indices in by_class.values_mut() {
        indices.sort_by_key(|&i| Reverse(OrderedFloat(candidates[i].confidence)));

        let mut suppressed = vec![false; indices.len()];
        for i in 0..indices.len() {
            if suppressed[i] {
                continue;
            }
            let idx_i = indices[i];
            keep_indices.push(idx_i);
            for j in (i + 1)..indices.len() {
                if suppressed[j] {
                    continue;
                }
                let iou = candidates[idx_i].bbox.iou(&candidates[indices[j]].bbox);
                if iou > iou_threshold {
                    suppressed[j] = true;
                }
            }
        }
    }

    // Index order first so equal confidences stay deterministic across hash orders.
    keep_indices.sort_unstable();
    keep_indices.sort_by_key(|&i| Reverse(OrderedFloat(candidates[i].confidence)));
    keep_indices.truncate(max_detections);

    let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    keep_indices
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}

/// Assemble a candidate's binary mask at input resolution.
///
/// Prototype mixture is passed through a sigmoid, upsampled to `input_size`, cropped to the
/// candidate box and thresholded.
pub fn candidate_mask(
    candidate: &Candidate,
    prototypes: ArrayView3<f32>,
    input_size: u32,
    mask_threshold: f32,
) -> Result<GrayImage> {
    let (mask_dim, mh, mw) = prototypes.dim();
    if candidate.coefficients.len() != mask_dim {
        return Err(VisionError::invalid_output(format!(
            "{} mask coefficients for {} prototypes",
            candidate.coefficients.len(),
            mask_dim
        )));
    }

    let mut probabilities: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::new(mw as u32, mh as u32);
    for (x, y, pixel) in probabilities.enumerate_pixels_mut() {
        let (x, y) = (x as usize, y as usize);
        let logit: f32 = candidate
            .coefficients
            .iter()
            .enumerate()
            .map(|(k, c)| c * prototypes[[k, y, x]])
            .sum();
        pixel.0[0] = sigmoid(logit);
    }
    let upsampled = image::imageops::resize(
        &probabilities,
        input_size,
        input_size,
        image::imageops::FilterType::Triangle,
    );

    let mut mask = GrayImage::new(input_size, input_size);
    for (x, y, pixel) in mask.enumerate_pixels_mut() {
        let inside = candidate.bbox.contains(x as f32 + 0.5, y as f32 + 0.5);
        if inside && upsampled.get_pixel(x, y).0[0] > mask_threshold {
            pixel.0[0] = 255;
        }
    }
    Ok(mask)
}

/// Largest outer contour of a binary mask, mapped to original image pixels.
///
/// Returns an empty polygon when the mask is empty.
pub fn mask_polygon(mask: &GrayImage, letterbox: &Letterbox) -> Vec<Point> {
    let contours = find_contours::<i32>(mask);
    contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .max_by_key(|c| c.points.len())
        .map(|c| {
            c.points
                .iter()
                .map(|p| {
                    let (x, y) = letterbox.to_original(p.x as f32, p.y as f32);
                    Point::new(x, y)
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    fn candidate(class_id: usize, confidence: f32, [x1, y1, x2, y2]: [f32; 4]) -> Candidate {
        Candidate {
            class_id,
            confidence,
            bbox: BoundingBox::new(x1, y1, x2, y2),
            coefficients: vec![1.0],
        }
    }

    #[test]
    fn test_argmax_prefers_first_of_ties() {
        assert_eq!(argmax_and_max([0.2, 0.7, 0.7, 0.1]), (1, 0.7));
    }

    #[test]
    fn test_box_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let iou = a.iou(&BoundingBox::new(5.0, 0.0, 15.0, 10.0));
        assert!((iou - 1.0 / 3.0).abs() < 1e-6);
        let far = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&far), 0.0);
        assert_eq!(BoundingBox::from_center(5.0, 5.0, 10.0, 10.0), a);
    }

    #[test]
    fn test_decode_filters_by_confidence() {
        // 2 anchors, 2 classes, 1 mask coefficient: rows = 4 + 2 + 1
        let predictions = Array2::from_shape_vec(
            (7, 2),
            vec![
                50.0, 10.0, // cx
                50.0, 10.0, // cy
                20.0, 4.0, // w
                10.0, 4.0, // h
                0.1, 0.2, // class 0
                0.9, 0.3, // class 1
                0.5, -0.5, // mask coefficient
            ],
        )
        .unwrap();
        let candidates = decode_candidates(predictions.view(), 2, 0.5);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].class_id, 1);
        assert_eq!(candidates[0].bbox, BoundingBox::new(40.0, 45.0, 60.0, 55.0));
        assert_eq!(candidates[0].coefficients, vec![0.5]);
    }

    #[test]
    fn test_nms_is_class_aware_and_capped() {
        let candidates = vec![
            candidate(0, 0.6, [0.0, 0.0, 10.0, 10.0]),
            candidate(0, 0.9, [1.0, 0.0, 11.0, 10.0]),
            candidate(1, 0.8, [0.0, 0.0, 10.0, 10.0]),
            candidate(0, 0.7, [50.0, 50.0, 60.0, 60.0]),
        ];
        let kept = non_maximum_suppression(candidates.clone(), 0.3, 10);
        let confs: Vec<f32> = kept.iter().map(|c| c.confidence).collect();
        assert_eq!(confs, vec![0.9, 0.8, 0.7]);

        let capped = non_maximum_suppression(candidates, 0.3, 2);
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].confidence, 0.9);
    }

    #[test]
    fn test_outputs_identified_by_rank() {
        let protos = ArrayD::zeros(ndarray::IxDyn(&[1, 2, 8, 8]));
        let preds = ArrayD::zeros(ndarray::IxDyn(&[1, 9, 100]));
        let outputs = SegmentationOutputs::from_outputs(vec![protos, preds], None).unwrap();
        assert_eq!(outputs.mask_dim(), 2);
        assert_eq!(outputs.num_classes(), 3);
    }

    #[test]
    fn test_outputs_without_prototypes_are_rejected() {
        let preds = ArrayD::zeros(ndarray::IxDyn(&[1, 9, 100]));
        assert!(SegmentationOutputs::from_outputs(vec![preds], None).is_err());
    }

    fn outputs(preds: &[usize], protos: &[usize], classes: Option<usize>) -> SegmentationOutputs {
        SegmentationOutputs::from_outputs(
            vec![
                ArrayD::zeros(ndarray::IxDyn(preds)),
                ArrayD::zeros(ndarray::IxDyn(protos)),
            ],
            classes,
        )
        .unwrap()
    }

    #[test]
    fn test_channels_first_kept_when_rows_exceed_anchors() {
        // 80 classes and 32 prototypes at a small input size: 84 anchors < 116 rows
        let o = outputs(&[1, 116, 84], &[1, 32, 16, 16], None);
        assert_eq!(o.num_classes(), 80);
        assert_eq!(o.num_anchors(), 84);

        let single = outputs(&[1, 7, 1], &[1, 1, 16, 16], None);
        assert_eq!(single.num_classes(), 2);
        assert_eq!(single.num_anchors(), 1);
    }

    #[test]
    fn test_anchor_major_output_is_transposed() {
        // Only the transposed reading leaves room for classes.
        let o = outputs(&[1, 5, 9], &[1, 2, 8, 8], None);
        assert_eq!(o.num_classes(), 3);
        assert_eq!(o.num_anchors(), 5);

        // Both readings fit; the known class count decides.
        let o = outputs(&[1, 100, 9], &[1, 2, 8, 8], Some(3));
        assert_eq!(o.num_classes(), 3);
        assert_eq!(o.num_anchors(), 100);
        let o = outputs(&[1, 9, 100], &[1, 2, 8, 8], Some(3));
        assert_eq!(o.num_anchors(), 100);
    }

    #[test]
    fn test_mask_is_cropped_to_box_and_traced() {
        // One prototype that is strongly positive everywhere.
        let prototypes = Array3::from_elem((1, 16, 16), 10.0f32);
        let c = Candidate {
            class_id: 0,
            confidence: 0.9,
            bbox: BoundingBox::new(16.0, 16.0, 48.0, 48.0),
            coefficients: vec![1.0],
        };
        let mask = candidate_mask(&c, prototypes.view(), 64, 0.5).unwrap();
        assert_eq!(mask.get_pixel(32, 32).0[0], 255);
        assert_eq!(mask.get_pixel(4, 4).0[0], 0);

        let letterbox = Letterbox::new(128, 128, 64);
        let polygon = mask_polygon(&mask, &letterbox);
        assert!(polygon.len() >= 10);
        for p in &polygon {
            assert!(p.x >= 30.0 && p.x <= 98.0, "x {}", p.x);
            assert!(p.y >= 30.0 && p.y <= 98.0, "y {}", p.y);
        }
    }

    #[test]
    fn test_empty_mask_gives_empty_polygon() {
        let mask = GrayImage::new(32, 32);
        assert!(mask_polygon(&mask, &Letterbox::new(32, 32, 32)).is_empty());
    }
}
