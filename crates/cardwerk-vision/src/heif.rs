// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HEIC/HEIF conversion through the system libheif.
//
// Only compiled with the "heif" feature, which links libheif via
// `libheif-rs`.

use cardwerk_core::error::{CardwerkError, Result};
use image::{DynamicImage, RgbImage};
use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};
use tracing::{debug, instrument};

use crate::codec;
use crate::decode::HeifConverter;

/// JPEG level used for the converted original unless overridden.
const DEFAULT_JPEG_LEVEL: u8 = 95;

/// Decodes the primary image of a HEIC/HEIF container and re-encodes it as
/// JPEG, so the rest of the pipeline only ever sees formats `image` reads.
#[derive(Debug, Clone, Copy)]
pub struct LibHeifConverter {
    jpeg_level: u8,
}

impl Default for LibHeifConverter {
    fn default() -> Self {
        Self {
            jpeg_level: DEFAULT_JPEG_LEVEL,
        }
    }
}

impl LibHeifConverter {
    pub fn with_jpeg_level(level: u8) -> Self {
        Self {
            jpeg_level: level.clamp(1, 100),
        }
    }
}

impl HeifConverter for LibHeifConverter {
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    fn convert_to_jpeg(&self, file_name: &str, data: &[u8]) -> Result<Vec<u8>> {
        let failure = |detail: String| CardwerkError::DecodeFailure {
            file: file_name.to_string(),
            detail,
        };

        let lib_heif = LibHeif::new();
        let context = HeifContext::read_from_bytes(data)
            .map_err(|err| failure(format!("not a readable HEIF container: {err}")))?;
        let handle = context
            .primary_image_handle()
            .map_err(|err| failure(format!("no primary image: {err}")))?;
        let image = lib_heif
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
            .map_err(|err| failure(format!("libheif decode failed: {err}")))?;

        let (width, height) = (image.width(), image.height());
        let planes = image.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| failure("decoded image has no interleaved RGB plane".into()))?;

        // Rows may be padded; copy only the visible pixels.
        let row = width as usize * 3;
        let mut pixels = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            let start = y * plane.stride;
            let line = plane
                .data
                .get(start..start + row)
                .ok_or_else(|| failure(format!("plane row {y} is truncated")))?;
            pixels.extend_from_slice(line);
        }
        let rgb = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| failure(format!("pixel buffer does not fit {width}x{height}")))?;

        let jpeg = codec::encode_jpeg(&DynamicImage::ImageRgb8(rgb), self.jpeg_level)
            .map_err(|err| failure(format!("JPEG re-encode failed: {err}")))?;
        debug!(width, height, jpeg_bytes = jpeg.len(), "HEIF converted to JPEG");
        Ok(jpeg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardwerk_core::SourceFormat;
    use cardwerk_core::config::DecoderConfig;
    use libheif_rs::{Channel, CompressionFormat, EncoderQuality, Image};

    use crate::decode::{Decoder, InputFile};

    /// Encode a flat-coloured RGB image as HEIC in memory.
    fn heic(width: u32, height: u32) -> Vec<u8> {
        let mut image = Image::new(width, height, ColorSpace::Rgb(RgbChroma::Rgb)).unwrap();
        image
            .create_plane(Channel::Interleaved, width, height, 8)
            .unwrap();
        let planes = image.planes_mut();
        let plane = planes.interleaved.unwrap();
        let stride = plane.stride;
        for y in 0..height as usize {
            for x in 0..width as usize {
                let at = y * stride + x * 3;
                plane.data[at..at + 3].copy_from_slice(&[200, 180, 40]);
            }
        }

        let lib_heif = LibHeif::new();
        let mut context = HeifContext::new().unwrap();
        let mut encoder = lib_heif
            .encoder_for_format(CompressionFormat::Hevc)
            .unwrap();
        encoder.set_quality(EncoderQuality::Lossy(90)).unwrap();
        context.encode_image(&image, &mut encoder, None).unwrap();
        context.write_to_bytes().unwrap()
    }

    #[test]
    fn heic_photo_decodes_through_libheif() {
        let decoder =
            Decoder::new(DecoderConfig::default()).with_heif_converter(LibHeifConverter::default());
        let file = InputFile::new("IMG_0007.HEIC", Some("image/heic".into()), heic(320, 240));
        let decoded = decoder.decode(&file).unwrap();

        assert_eq!(decoded.source_format, SourceFormat::Heic);
        assert_eq!((decoded.width, decoded.height), (320, 240));
        assert!(decoded.original_blob.starts_with(&[0xFF, 0xD8]));
    }

    #[test]
    fn garbage_is_a_decode_failure() {
        let result = LibHeifConverter::default().convert_to_jpeg("IMG_0008.HEIC", &[0, 1, 2, 3]);
        match result {
            Err(CardwerkError::DecodeFailure { file, .. }) => assert_eq!(file, "IMG_0008.HEIC"),
            other => panic!("expected DecodeFailure, got {other:?}"),
        }
    }
}
