use std::path::Path;

use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, RgbImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VisionError};

/// Memory layout of an image batch tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[batch, height, width, channels]`, the Keras convention.
    Nhwc,
    /// `[batch, channels, height, width]`, the PyTorch convention.
    Nchw,
}

/// How an image was fitted into a square detector input.
///
/// Needed to map coordinates from model space back to the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub offset: (u32, u32),
    /// Size of the image inside the padded canvas.
    pub resized: (u32, u32),
    pub original: (u32, u32),
}

impl Letterbox {
    pub fn new(width: u32, height: u32, input_size: u32) -> Self {
        let scale = (input_size as f32 / width as f32).min(input_size as f32 / height as f32);
        let new_width = ((width as f32 * scale).round() as u32).clamp(1, input_size);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, input_size);
        Self {
            scale,
            offset: ((input_size - new_width) / 2, (input_size - new_height) / 2),
            resized: (new_width, new_height),
            original: (width, height),
        }
    }

    /// Map a point in model input space to original image pixels, clamped to the image.
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let ox = (x - self.offset.0 as f32) / self.scale;
        let oy = (y - self.offset.1 as f32) / self.scale;
        (
            ox.clamp(0.0, self.original.0 as f32),
            oy.clamp(0.0, self.original.1 as f32),
        )
    }
}

/// Decode an image file and force it to 3-channel RGB, dropping alpha or expanding gray.
pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let image = image::open(path.as_ref())?;
    Ok(image.to_rgb8())
}

/// Resize an RGB image to exactly `width` x `height`.
pub fn resize_rgb(image: &RgbImage, width: u32, height: u32, alg: ResizeAlg) -> Result<RgbImage> {
    if image.width() == width && image.height() == height {
        return Ok(image.clone());
    }
    let src = DynamicImage::ImageRgb8(image.clone());
    let mut dst = Image::new(width, height, PixelType::U8x3);

    let mut resizer = Resizer::new();
    let options = ResizeOptions::new().resize_alg(alg);
    resizer
        .resize(&src, &mut dst, Some(&options))
        .map_err(|e| VisionError::invalid_input(format!("resize failed: {e}")))?;

    RgbImage::from_raw(width, height, dst.buffer().to_vec())
        .ok_or_else(|| VisionError::invalid_input("resized buffer has the wrong size"))
}

/// Build a single-item classifier batch from raw 0..255 pixel values.
///
/// The exported classifier carries its own normalisation layer, so no scaling is applied.
pub fn classifier_tensor(image: &RgbImage, size: u32, layout: TensorLayout) -> Result<Array4<f32>> {
    if size == 0 {
        return Err(VisionError::invalid_input("classifier input size must be positive"));
    }
    let resized = resize_rgb(
        image,
        size,
        size,
        ResizeAlg::Convolution(FilterType::CatmullRom),
    )?;
    let side = size as usize;
    let mut tensor = match layout {
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, side, side, 3)),
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, side, side)),
    };
    for (x, y, rgb) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = rgb[c] as f32;
            match layout {
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
            }
        }
    }
    Ok(tensor)
}

/// Letterbox an image into a square detector input.
///
/// The image is scaled to fit, centred on a canvas filled with `pad_value`, and returned
/// as an NCHW tensor with values in `[0, 1]`.
pub fn letterbox_tensor(
    image: &RgbImage,
    input_size: u32,
    pad_value: u8,
) -> Result<(Array4<f32>, Letterbox)> {
    if input_size == 0 {
        return Err(VisionError::invalid_input("detector input size must be positive"));
    }
    if image.width() == 0 || image.height() == 0 {
        return Err(VisionError::invalid_input("image has zero size"));
    }
    let letterbox = Letterbox::new(image.width(), image.height(), input_size);
    let (new_width, new_height) = letterbox.resized;
    let resized = resize_rgb(
        image,
        new_width,
        new_height,
        ResizeAlg::Convolution(FilterType::Bilinear),
    )?;

    // Centre the resized image on the padded canvas
    let mut padded = RgbImage::from_pixel(
        input_size,
        input_size,
        image::Rgb([pad_value, pad_value, pad_value]),
    );
    image::imageops::overlay(
        &mut padded,
        &resized,
        letterbox.offset.0 as i64,
        letterbox.offset.1 as i64,
    );

    let side = input_size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, rgb) in padded.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        tensor[[0, 0, y, x]] = rgb[0] as f32 / 255.0;
        tensor[[0, 1, y, x]] = rgb[1] as f32 / 255.0;
        tensor[[0, 2, y, x]] = rgb[2] as f32 / 255.0;
    }
    Ok((tensor, letterbox))
}
