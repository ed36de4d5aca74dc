use std::path::Path;

use image::Rgb;
use imageproc::drawing::draw_hollow_polygon_mut;
use imageproc::point::Point as DrawPoint;

use crate::error::Result;
use crate::preprocess::load_rgb;
use crate::types::Detection;

const OUTLINE: Rgb<u8> = Rgb([255, 0, 0]);

/// Draw detection outlines over the source image and save the result.
pub fn draw_detections(img_path: &Path, detections: &[Detection], output_path: &Path) -> Result<()> {
    let mut img = load_rgb(img_path)?;

    for detection in detections {
        let mut outline: Vec<DrawPoint<f32>> = detection
            .polygon
            .iter()
            .map(|p| DrawPoint::new(p.x, p.y))
            .collect();
        // imageproc closes the ring itself and rejects an explicit closing point
        if outline.len() > 1 && outline.first() == outline.last() {
            outline.pop();
        }
        if outline.len() < 3 {
            continue;
        }
        draw_hollow_polygon_mut(&mut img, &outline, OUTLINE);
    }

    img.save(output_path)?;
    Ok(())
}
