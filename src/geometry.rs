//! Polygon overlap scoring for segmentation masks.
//!
//! The primary score is the intersection-over-union of the enclosed areas. Mask contours
//! are frequently self-touching or degenerate, in which case area arithmetic is not
//! trustworthy and the score falls back to a binary centroid-distance test.

use clipper2::{FillRule, Path as ClipperPath, Paths};
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// Centroid distance, in pixels, below which two invalid polygons count as the same object.
pub const DEFAULT_CENTROID_DISTANCE: f32 = 50.0;

/// A 2D point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Arithmetic mean of the vertices, or `None` for an empty polygon.
pub fn centroid(polygon: &[Point]) -> Option<Point> {
    if polygon.is_empty() {
        return None;
    }
    let n = polygon.len() as f32;
    let (sx, sy) = polygon
        .iter()
        .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

/// Area enclosed by the ring, by the shoelace formula.
pub fn area(polygon: &[Point]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let n = polygon.len();
    let mut acc = 0.0f64;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        acc += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
    }
    acc.abs() / 2.0
}

/// A polygon is valid when it has at least three distinct vertices, finite coordinates,
/// non-zero area and no two non-adjacent edges that touch or cross.
pub fn is_valid(polygon: &[Point]) -> bool {
    let ring = without_repeats(polygon);
    if ring.len() < 3 {
        return false;
    }
    if ring.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return false;
    }
    if area(&ring) <= f64::EPSILON {
        return false;
    }
    !self_intersects(&ring)
}

/// Similarity of two polygons in `[0, 1]`.
///
/// Uses area IoU when both polygons are valid and the boolean operations succeed,
/// and the centroid test against `centroid_distance` otherwise.
pub fn overlap_score(a: &[Point], b: &[Point], centroid_distance: f32) -> f32 {
    match polygon_iou(a, b) {
        Ok(iou) => iou,
        Err(err) => {
            tracing::trace!(error = %err, "falling back to centroid distance");
            centroid_score(a, b, centroid_distance)
        }
    }
}

/// Area intersection-over-union of two valid polygons.
pub fn polygon_iou(a: &[Point], b: &[Point]) -> Result<f32, GeometryError> {
    if !is_valid(a) || !is_valid(b) {
        return Err(GeometryError::InvalidPolygon);
    }

    let inter = clipper2::intersect(to_paths(a), to_paths(b), FillRule::NonZero)?;
    let union = clipper2::union(to_paths(a), to_paths(b), FillRule::NonZero)?;

    let inter_area = paths_area(inter);
    let union_area = paths_area(union);
    if union_area <= 0.0 {
        return Ok(0.0);
    }
    Ok(((inter_area / union_area) as f32).clamp(0.0, 1.0))
}

/// Binary score: 1 if the centroids are closer than `threshold` pixels, else 0.
pub fn centroid_score(a: &[Point], b: &[Point], threshold: f32) -> f32 {
    match (centroid(a), centroid(b)) {
        (Some(ca), Some(cb)) if ca.distance(&cb) < threshold => 1.0,
        _ => 0.0,
    }
}

fn to_paths(polygon: &[Point]) -> Paths {
    let path: ClipperPath = polygon
        .iter()
        .map(|p| (p.x as f64, p.y as f64))
        .collect::<Vec<_>>()
        .into();
    Paths::new(vec![path])
}

// Holes come back with the opposite winding, so the signed sum is the net area.
fn paths_area(paths: Paths) -> f64 {
    paths
        .into_iter()
        .map(|path| path.signed_area())
        .sum::<f64>()
        .abs()
}

fn without_repeats(polygon: &[Point]) -> Vec<Point> {
    let mut ring: Vec<Point> = Vec::with_capacity(polygon.len());
    for p in polygon {
        if ring.last() != Some(p) {
            ring.push(*p);
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

fn self_intersects(ring: &[Point]) -> bool {
    let n = ring.len();
    if n < 4 {
        return false;
    }
    for i in 0..n {
        let (a1, a2) = (ring[i], ring[(i + 1) % n]);
        for j in (i + 1)..n {
            // Adjacent edges share a vertex by construction.
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            let (b1, b2) = (ring[j], ring[(j + 1) % n]);
            if segments_intersect(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}

fn orientation(p: Point, q: Point, r: Point) -> f64 {
    (q.x as f64 - p.x as f64) * (r.y as f64 - p.y as f64)
        - (q.y as f64 - p.y as f64) * (r.x as f64 - p.x as f64)
}

fn on_segment(p: Point, q: Point, r: Point) -> bool {
    r.x >= p.x.min(q.x) && r.x <= p.x.max(q.x) && r.y >= p.y.min(q.y) && r.y <= p.y.max(q.y)
}

fn segments_intersect(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}
