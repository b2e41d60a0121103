// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image decoder: turns an uploaded photo into a decoded original plus a
// down-scaled working copy used for interactive detection.

use std::path::Path;

use cardwerk_core::config::DecoderConfig;
use cardwerk_core::error::{CardwerkError, Result};
use cardwerk_core::{Quality, SourceFormat, WorkingImageInfo};
use image::DynamicImage;
use image::imageops::FilterType;
use tracing::{debug, info, instrument, warn};

use crate::codec;

/// Upper bound on the pixel count of a working surface (16384 x 16384).
const MAX_SURFACE_PIXELS: u64 = 16_384 * 16_384;

/// Software HEIC/HEIF → JPEG conversion, used when the photo cannot be
/// decoded directly.
pub trait HeifConverter: Send + Sync {
    /// Convert `data` to JPEG bytes. `file_name` is for error messages.
    fn convert_to_jpeg(&self, file_name: &str, data: &[u8]) -> Result<Vec<u8>>;
}

/// Converter used when no HEIF codec is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHeifConverter;

impl HeifConverter for NoHeifConverter {
    fn convert_to_jpeg(&self, file_name: &str, _data: &[u8]) -> Result<Vec<u8>> {
        Err(CardwerkError::DecodeFailure {
            file: file_name.to_string(),
            detail: "no HEIC/HEIF converter is available; export the photo as JPEG".into(),
        })
    }
}

/// An uploaded photo: its name, optional declared MIME type, and bytes.
#[derive(Clone)]
pub struct InputFile {
    pub name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, mime: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime,
            bytes,
        }
    }

    /// Read a photo from disk. The format is inferred from its suffix.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, None, bytes))
    }
}

impl std::fmt::Debug for InputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Result of decoding one photo.
pub struct DecodedImage {
    pub file_name: String,
    pub source_format: SourceFormat,
    /// Full-resolution bitmap.
    pub decoded: DynamicImage,
    /// Encoded original, always decodable without the HEIF converter.
    pub original_blob: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub working: DynamicImage,
    pub working_blob: Vec<u8>,
    pub working_width: u32,
    pub working_height: u32,
}

impl DecodedImage {
    /// Drop the bitmaps and keep the encoded record the session stores.
    pub fn into_working_info(self) -> WorkingImageInfo {
        WorkingImageInfo::new(
            self.file_name,
            self.working_blob,
            (self.working_width, self.working_height),
            self.original_blob,
            (self.width, self.height),
        )
    }
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("file_name", &self.file_name)
            .field("source_format", &self.source_format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("working_width", &self.working_width)
            .field("working_height", &self.working_height)
            .finish()
    }
}

/// Decodes uploaded photos and derives their working copies.
pub struct Decoder {
    config: DecoderConfig,
    heif: Box<dyn HeifConverter>,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            heif: Box::new(NoHeifConverter),
        }
    }

    /// Replace the HEIC/HEIF fallback converter.
    pub fn with_heif_converter(mut self, converter: impl HeifConverter + 'static) -> Self {
        self.heif = Box::new(converter);
        self
    }

    /// Decode a photo and build its working copy.
    ///
    /// Fails with `UnsupportedFormat` before touching the bytes when the
    /// type is not one of JPEG, PNG, HEIC, HEIF or AVIF.
    #[instrument(skip(self, file), fields(file = %file.name, bytes = file.bytes.len()))]
    pub fn decode(&self, file: &InputFile) -> Result<DecodedImage> {
        let source_format = SourceFormat::infer(file.mime.as_deref(), &file.name).ok_or_else(
            || CardwerkError::UnsupportedFormat {
                file: file.name.clone(),
                detail: file
                    .mime
                    .clone()
                    .unwrap_or_else(|| "unrecognised file type".into()),
            },
        )?;

        let (decoded, original_blob) = match codec::decode_bytes(&file.bytes) {
            Ok(img) => (img, file.bytes.clone()),
            Err(err) if source_format.is_heif_like() => {
                debug!(error = %err, "direct decode failed; converting HEIC/HEIF");
                let converted = self.heif.convert_to_jpeg(&file.name, &file.bytes)?;
                let img = codec::decode_bytes(&converted).map_err(|err| {
                    CardwerkError::DecodeFailure {
                        file: file.name.clone(),
                        detail: format!("converted HEIC/HEIF could not be decoded: {err}"),
                    }
                })?;
                (img, converted)
            }
            Err(err) => {
                warn!(error = %err, "decode failed");
                return Err(CardwerkError::DecodeFailure {
                    file: file.name.clone(),
                    detail: err.to_string(),
                });
            }
        };

        let (width, height) = (decoded.width(), decoded.height());
        let (working_width, working_height) =
            working_dimensions(width, height, self.config.working_max_edge);
        check_surface(&file.name, working_width, working_height)?;

        let working = if (working_width, working_height) == (width, height) {
            decoded.clone()
        } else {
            decoded.resize_exact(working_width, working_height, FilterType::Triangle)
        };

        let encoded = if codec::is_png(&original_blob) {
            codec::encode_png(&working)
        } else {
            let level = Quality::from_normalized(self.config.working_jpeg_quality).jpeg_level();
            codec::encode_jpeg(&working, level)
        };
        let working_blob = encoded.map_err(|err| CardwerkError::ContextCreationFailure {
            file: file.name.clone(),
            detail: format!("working copy could not be encoded: {err}"),
        })?;

        info!(
            ?source_format,
            width,
            height,
            working_width,
            working_height,
            "Photo decoded"
        );

        Ok(DecodedImage {
            file_name: file.name.clone(),
            source_format,
            decoded,
            original_blob,
            width,
            height,
            working,
            working_blob,
            working_width,
            working_height,
        })
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// `scale = min(1, max_edge / max(w, h))`, each side rounded and at least 1.
pub fn working_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height).max(1) as f64;
    let scale = (max_edge as f64 / longest).min(1.0);
    let side = |v: u32| ((v as f64 * scale).round() as u32).max(1);
    (side(width), side(height))
}

fn check_surface(file: &str, width: u32, height: u32) -> Result<()> {
    let pixels = width as u64 * height as u64;
    if width == 0 || height == 0 || pixels > MAX_SURFACE_PIXELS {
        return Err(CardwerkError::ContextCreationFailure {
            file: file.to_string(),
            detail: format!("cannot allocate a {width}x{height} surface"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn photo(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 120, 150])))
    }

    struct JpegPassthrough(Vec<u8>);

    impl HeifConverter for JpegPassthrough {
        fn convert_to_jpeg(&self, _file_name: &str, _data: &[u8]) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn text_file_is_rejected_before_decoding() {
        let decoder = Decoder::new(DecoderConfig::default());
        let file = InputFile::new("notes.txt", Some("text/plain".into()), b"hello".to_vec());
        match decoder.decode(&file) {
            Err(CardwerkError::UnsupportedFormat { file, .. }) => assert_eq!(file, "notes.txt"),
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn large_photo_gets_scaled_working_copy() {
        let jpeg = codec::encode_jpeg(&photo(3000, 2000), 90).unwrap();
        let decoder = Decoder::new(DecoderConfig::default());
        let decoded = decoder
            .decode(&InputFile::new("front.jpg", None, jpeg))
            .unwrap();

        assert_eq!((decoded.width, decoded.height), (3000, 2000));
        assert_eq!((decoded.working_width, decoded.working_height), (2500, 1667));
        assert!(!codec::is_png(&decoded.working_blob));

        let info = decoded.into_working_info();
        assert!((info.scale_x - 1.2).abs() < 1e-9);
        assert!((info.scale_y - 2000.0 / 1667.0).abs() < 1e-9);
    }

    #[test]
    fn small_png_keeps_size_and_format() {
        let png = codec::encode_png(&photo(640, 480)).unwrap();
        let decoder = Decoder::new(DecoderConfig::default());
        let decoded = decoder
            .decode(&InputFile::new("back.png", Some("image/png".into()), png))
            .unwrap();
        assert_eq!((decoded.working_width, decoded.working_height), (640, 480));
        assert!(codec::is_png(&decoded.working_blob));
    }

    #[test]
    fn corrupted_jpeg_is_a_decode_failure() {
        let decoder = Decoder::new(DecoderConfig::default());
        let file = InputFile::new("broken.jpg", None, vec![0xFF, 0xD8, 0x00, 0x01]);
        assert!(matches!(
            decoder.decode(&file),
            Err(CardwerkError::DecodeFailure { .. })
        ));
    }

    #[test]
    fn heic_without_converter_names_the_file() {
        let decoder = Decoder::new(DecoderConfig::default());
        let file = InputFile::new("IMG_0042.HEIC", None, vec![0, 0, 0, 24]);
        match decoder.decode(&file) {
            Err(CardwerkError::DecodeFailure { file, .. }) => assert_eq!(file, "IMG_0042.HEIC"),
            other => panic!("expected DecodeFailure, got {other:?}"),
        }
    }

    #[test]
    fn heic_fallback_stores_converted_original() {
        let jpeg = codec::encode_jpeg(&photo(100, 80), 90).unwrap();
        let decoder = Decoder::new(DecoderConfig::default())
            .with_heif_converter(JpegPassthrough(jpeg.clone()));
        let decoded = decoder
            .decode(&InputFile::new("card.heic", Some("image/heic".into()), vec![1, 2, 3]))
            .unwrap();
        assert_eq!(decoded.source_format, SourceFormat::Heic);
        assert_eq!(decoded.original_blob, jpeg);
        assert_eq!((decoded.width, decoded.height), (100, 80));
    }

    #[test]
    fn working_dimensions_never_collapse() {
        assert_eq!(working_dimensions(10_000, 1, 2500), (2500, 1));
        assert_eq!(working_dimensions(1200, 1600, 2500), (1200, 1600));
    }

    #[test]
    fn zero_surface_is_a_context_failure() {
        assert!(matches!(
            check_surface("x.png", 0, 10),
            Err(CardwerkError::ContextCreationFailure { .. })
        ));
    }
}
