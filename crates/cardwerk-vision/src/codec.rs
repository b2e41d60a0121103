// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster encode/decode helpers shared by the decoder and the renderer.
// Errors are returned as `image::ImageError` so each caller can attach the
// file or pair it was working on.

use std::io::Cursor;

use cardwerk_core::{OutputFormat, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError, ImageFormat};
use tracing::debug;

/// Decode an encoded image, guessing the container from its magic bytes.
pub fn decode_bytes(data: &[u8]) -> Result<DynamicImage, ImageError> {
    let img = image::load_from_memory(data)?;
    debug!(
        width = img.width(),
        height = img.height(),
        "Image decoded from bytes"
    );
    Ok(img)
}

/// Whether the bytes are a PNG stream.
pub fn is_png(data: &[u8]) -> bool {
    matches!(image::guess_format(data), Ok(ImageFormat::Png))
}

/// Encode as JPEG at the given encoder level (1-100). Alpha is dropped.
pub fn encode_jpeg(image: &DynamicImage, level: u8) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    let rgb = image.to_rgb8();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, level);
    rgb.write_with_encoder(encoder)?;
    Ok(buffer)
}

/// Encode as PNG.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

/// Encode in an export format. PNG ignores `quality`.
pub fn encode(
    image: &DynamicImage,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, ImageError> {
    match format {
        OutputFormat::Jpeg => encode_jpeg(image, quality.jpeg_level()),
        OutputFormat::Png => encode_png(image),
    }
}
