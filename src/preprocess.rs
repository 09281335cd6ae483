//! Conversion of arbitrary uploaded image bytes into the network's input distribution.
//!
//! Uploads are usually strokes drawn on a transparent canvas, so transparency is
//! flattened to white before the image is reduced to 28x28 grayscale and normalized
//! with the same constants as the training batches.

use crate::data::{normalize, IMAGE_SIZE};
use crate::error::Result;
use burn::prelude::*;
use image::{
    error::{DecodingError, ImageFormatHint},
    imageops::FilterType,
    DynamicImage, GrayImage, ImageError, Luma, Rgb, RgbImage,
};

const WHITE: u8 = u8::MAX;

/// Preprocesses `bytes` into a `[1, 1, 28, 28]` image tensor on `device`.
pub fn preprocess<B: Backend>(bytes: &[u8], device: &B::Device) -> Result<Tensor<B, 4>> {
    let pixels = normalized_pixels(bytes)?;
    let data = TensorData::new(pixels, [1, 1, IMAGE_SIZE, IMAGE_SIZE]);

    Ok(Tensor::from_data(data.convert::<B::FloatElem>(), device))
}

/// Decodes, flattens onto white, grayscales, resizes and normalizes `bytes`.
///
/// Returns the 784 pixels in row-major order. Images without any pixel are
/// rejected as undecodable.
pub fn normalized_pixels(bytes: &[u8]) -> Result<Vec<f32>> {
    let image = image::load_from_memory(bytes)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(ImageError::Decoding(DecodingError::new(
            ImageFormatHint::Unknown,
            format!("empty {}x{} image", image.width(), image.height()),
        ))
        .into());
    }
    let gray = grayscale(&flatten_onto_white(&image));
    let resized = image::imageops::resize(
        &gray,
        IMAGE_SIZE as u32,
        IMAGE_SIZE as u32,
        FilterType::Triangle,
    );

    Ok(resized
        .pixels()
        .map(|Luma([value])| normalize(*value as f32 / WHITE as f32))
        .collect())
}

/// Composites `image` over an opaque white canvas, using its alpha channel as mask.
pub fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut canvas = RgbImage::from_pixel(rgba.width(), rgba.height(), Rgb([WHITE; 3]));

    for (source, target) in rgba.pixels().zip(canvas.pixels_mut()) {
        let [r, g, b, alpha] = source.0;
        let blend = |channel: u8| {
            let alpha = alpha as u32;
            let mixed = channel as u32 * alpha + WHITE as u32 * (255 - alpha);
            ((mixed + 127) / 255) as u8
        };
        *target = Rgb([blend(r), blend(g), blend(b)]);
    }

    canvas
}

/// ITU-R 601-2 luma transform, `L = R * 299/1000 + G * 587/1000 + B * 114/1000`.
pub fn grayscale(image: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(image.width(), image.height());

    for (source, target) in image.pixels().zip(gray.pixels_mut()) {
        let [r, g, b] = source.0;
        let luma = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
        *target = Luma([luma as u8]);
    }

    gray
}
