//! Image attachment normalization for vision input.
//!
//! RGB, shorter edge capped at 768 px, both sides stretched up to a
//! multiple of 512 px (the model's tile size), JPEG q85, base64.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use souschef_core::{Error, Result};

const MAX_SHORT_EDGE: u32 = 768;
const TILE: u32 = 512;
const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub width: u32,
    pub height: u32,
    /// Base64 of the JPEG bytes, no prefix
    pub base64: String,
}

impl NormalizedImage {
    pub fn data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.base64)
    }
}

/// Decode, resize, and re-encode `bytes`. CPU-bound; call from
/// `spawn_blocking` when on the async executor.
pub fn normalize_image(bytes: &[u8]) -> Result<NormalizedImage> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| Error::validation(format!("unreadable image attachment: {e}")))?;
    let mut img = DynamicImage::ImageRgb8(decoded.to_rgb8());

    let (width, height) = img.dimensions();
    let shorter = width.min(height);
    if shorter > MAX_SHORT_EDGE {
        let scale = f64::from(MAX_SHORT_EDGE) / f64::from(shorter);
        let scaled_w = ((f64::from(width) * scale) as u32).max(1);
        let scaled_h = ((f64::from(height) * scale) as u32).max(1);
        img = img.resize_exact(scaled_w, scaled_h, FilterType::Lanczos3);
    }

    let (width, height) = img.dimensions();
    let (tiled_w, tiled_h) = (tile_align(width), tile_align(height));
    if (tiled_w, tiled_h) != (width, height) {
        img = img.resize_exact(tiled_w, tiled_h, FilterType::Lanczos3);
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&DynamicImage::ImageRgb8(img.to_rgb8()))
        .map_err(|e| Error::Internal(format!("JPEG encoding failed: {e}")))?;

    Ok(NormalizedImage {
        width: tiled_w,
        height: tiled_h,
        base64: BASE64.encode(&jpeg),
    })
}

fn tile_align(side: u32) -> u32 {
    side.div_ceil(TILE).max(1) * TILE
}
