// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Cardwerk: detection geometry, image formats, the
// renderer wire contract, progress events, and the per-pair manifest.

use serde::{Deserialize, Serialize};

// -- Geometry -----------------------------------------------------------------

/// Axis-aligned integer pixel rectangle.
///
/// Coordinates live in the space of whichever image the rectangle was
/// measured on (working or original). Signed so that user-drawn rectangles
/// hanging off an edge survive until they are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Scale both corners by independent factors, rounding to whole pixels.
    /// The result is never smaller than 1x1.
    pub fn scaled(&self, scale_x: f64, scale_y: f64) -> Self {
        let x0 = (self.x as f64 * scale_x).round();
        let y0 = (self.y as f64 * scale_y).round();
        let x1 = (self.right() as f64 * scale_x).round();
        let y1 = (self.bottom() as f64 * scale_y).round();
        Self {
            x: x0 as i32,
            y: y0 as i32,
            width: ((x1 - x0) as i32).max(1),
            height: ((y1 - y0) as i32).max(1),
        }
    }
}

/// A 2D point in pixel (or normalized) coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Target dimensions of a perspective-corrected crop. Always at least 1x1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WarpSize {
    pub width: u32,
    pub height: u32,
}

impl WarpSize {
    /// Round fractional dimensions, never going below one pixel.
    pub fn from_dimensions(width: f64, height: f64) -> Self {
        let round = |v: f64| {
            if v.is_finite() {
                v.round().max(1.0) as u32
            } else {
                1
            }
        };
        Self {
            width: round(width),
            height: round(height),
        }
    }
}

/// A detected (or manually drawn) card region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedCard {
    /// Envelope of the card outline.
    pub bounding_box: BoundingBox,
    /// Outline ordered clockwise from the top-left-most corner. Anything
    /// other than four points means no warp is available for this card.
    pub quad: Vec<Point>,
    /// Centre normalised to `[0, 1]` by the image dimensions.
    pub center_norm: Point,
    pub warp_size: WarpSize,
}

impl DetectedCard {
    /// Build a detection from a user-drawn axis-aligned rectangle.
    pub fn from_rect(rect: BoundingBox, image_width: u32, image_height: u32) -> Self {
        let (x0, y0) = (rect.x.max(0) as f64, rect.y.max(0) as f64);
        let (x1, y1) = (rect.right().max(0) as f64, rect.bottom().max(0) as f64);
        let center = Point::new((x0 + x1) / 2.0, (y0 + y1) / 2.0);
        Self {
            bounding_box: rect,
            quad: vec![
                Point::new(x0, y0),
                Point::new(x1, y0),
                Point::new(x1, y1),
                Point::new(x0, y1),
            ],
            center_norm: Point::new(
                center.x / image_width.max(1) as f64,
                center.y / image_height.max(1) as f64,
            ),
            warp_size: WarpSize::from_dimensions(x1 - x0, y1 - y0),
        }
    }

    /// The quad as a fixed array, or `None` if it does not have exactly four
    /// points.
    pub fn warp_quad(&self) -> Option<[Point; 4]> {
        <[Point; 4]>::try_from(self.quad.as_slice()).ok()
    }

    /// Rescale geometry by per-axis factors (e.g. working → original space).
    /// `center_norm` is resolution independent and is carried over as-is.
    pub fn scaled(&self, scale_x: f64, scale_y: f64) -> Self {
        Self {
            bounding_box: self.bounding_box.scaled(scale_x, scale_y),
            quad: self
                .quad
                .iter()
                .map(|p| Point::new(p.x * scale_x, p.y * scale_y))
                .collect(),
            center_norm: self.center_norm,
            warp_size: WarpSize::from_dimensions(
                self.warp_size.width as f64 * scale_x,
                self.warp_size.height as f64 * scale_y,
            ),
        }
    }
}

// -- Files and working images -------------------------------------------------

/// Identifier of an uploaded photo within a session (e.g. "front", "back").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-file record linking the down-scaled interactive image to its original.
#[derive(Clone)]
pub struct WorkingImageInfo {
    /// Name of the uploaded file.
    pub file_name: String,
    /// Encoded working-resolution image.
    pub blob: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Encoded original-resolution image. Always decodable by the `image`
    /// crate (HEIC sources are stored after conversion).
    pub original_blob: Vec<u8>,
    pub original_width: u32,
    pub original_height: u32,
    /// `original_width / width`.
    pub scale_x: f64,
    /// `original_height / height`.
    pub scale_y: f64,
}

impl WorkingImageInfo {
    pub fn new(
        file_name: impl Into<String>,
        blob: Vec<u8>,
        (width, height): (u32, u32),
        original_blob: Vec<u8>,
        (original_width, original_height): (u32, u32),
    ) -> Self {
        Self {
            file_name: file_name.into(),
            blob,
            width,
            height,
            original_blob,
            original_width,
            original_height,
            scale_x: original_width as f64 / width.max(1) as f64,
            scale_y: original_height as f64 / height.max(1) as f64,
        }
    }

    /// Rescale a detection measured on the working image into original-image
    /// coordinates.
    pub fn to_original(&self, card: &DetectedCard) -> DetectedCard {
        card.scaled(self.scale_x, self.scale_y)
    }
}

impl std::fmt::Debug for WorkingImageInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingImageInfo")
            .field("file_name", &self.file_name)
            .field("blob_len", &self.blob.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("original_blob_len", &self.original_blob.len())
            .field("original_width", &self.original_width)
            .field("original_height", &self.original_height)
            .field("scale_x", &self.scale_x)
            .field("scale_y", &self.scale_y)
            .finish()
    }
}

// -- Formats ------------------------------------------------------------------

/// Accepted input photo formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Jpeg,
    Png,
    Heic,
    Heif,
    Avif,
}

impl SourceFormat {
    /// Infer the format from a declared MIME type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let lower = mime.to_ascii_lowercase();
        match lower.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/avif" => Some(Self::Avif),
            _ if lower.contains("heic") => Some(Self::Heic),
            _ if lower.contains("heif") => Some(Self::Heif),
            _ => None,
        }
    }

    /// Infer the format from a filename suffix.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "heic" => Some(Self::Heic),
            "heif" => Some(Self::Heif),
            "avif" => Some(Self::Avif),
            _ => None,
        }
    }

    /// Declared MIME type first, filename suffix second.
    pub fn infer(mime: Option<&str>, file_name: &str) -> Option<Self> {
        mime.and_then(Self::from_mime)
            .or_else(|| Self::from_file_name(file_name))
    }

    /// HEIC and HEIF both go through the software conversion fallback.
    pub fn is_heif_like(&self) -> bool {
        matches!(self, Self::Heic | Self::Heif)
    }
}

/// Encoded output format for exported crops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    /// File extension used in exported names.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

/// Normalised encoder quality in `[0, 1]`. Ignored for PNG.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quality(f32);

impl Quality {
    pub const UI_MIN: u32 = 70;
    pub const UI_MAX: u32 = 100;

    /// Map a UI-level quality (70..=100) onto `[0.7, 1.0]`, clamping.
    pub fn from_ui(level: u32) -> Self {
        Self(level.clamp(Self::UI_MIN, Self::UI_MAX) as f32 / 100.0)
    }

    /// Clamp an already-normalised value into `[0, 1]`.
    pub fn from_normalized(value: f32) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn normalized(&self) -> f32 {
        self.0
    }

    /// Quality level for the JPEG encoder (1-100).
    pub fn jpeg_level(&self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.92)
    }
}

// -- Sides and output naming --------------------------------------------------

/// Which photo of a pair a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Front,
    Back,
}

impl Side {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Front => "FRONT",
            Self::Back => "BACK",
        }
    }
}

/// The four corner detail crops, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::TopLeft => "TOP_LEFT",
            Self::TopRight => "TOP_RIGHT",
            Self::BottomLeft => "BOTTOM_LEFT",
            Self::BottomRight => "BOTTOM_RIGHT",
        }
    }
}

/// `FRONT_LISTING.jpg`, `BACK_LISTING.png`, ...
pub fn listing_name(side: Side, format: OutputFormat) -> String {
    format!("{}_LISTING.{}", side.prefix(), format.extension())
}

/// `FRONT_TOP_LEFT.jpg`, ...
pub fn quadrant_name(side: Side, quadrant: Quadrant, format: OutputFormat) -> String {
    format!(
        "{}_{}.{}",
        side.prefix(),
        quadrant.suffix(),
        format.extension()
    )
}

/// Only the front side is ever warped.
pub fn warped_name(format: OutputFormat) -> String {
    format!("FRONT_WARPED.{}", format.extension())
}

/// Number of images a pair produces: listing + four quadrants per side, plus
/// the front warp when requested.
pub fn images_per_pair(include_warped: bool, has_back: bool) -> u64 {
    let front = if include_warped { 6 } else { 5 };
    let back = if has_back { 5 } else { 0 };
    front + back
}

// -- Renderer wire contract ---------------------------------------------------

/// One side of a pair, already rescaled to original-image coordinates.
#[derive(Clone)]
pub struct SidePayload {
    /// Encoded original-resolution image.
    pub image: Vec<u8>,
    /// Name of the source photo, for manifests.
    pub source_file: Option<String>,
    pub bounding_box: BoundingBox,
    pub quad: Vec<Point>,
    pub warp_size: WarpSize,
}

impl SidePayload {
    /// Build a payload from an original-space detection.
    pub fn from_card(image: Vec<u8>, source_file: Option<String>, card: &DetectedCard) -> Self {
        Self {
            image,
            source_file,
            bounding_box: card.bounding_box,
            quad: card.quad.clone(),
            warp_size: card.warp_size,
        }
    }

    /// Geometry record for the manifest.
    pub fn manifest(&self) -> SideManifest {
        SideManifest {
            bbox: self.bounding_box,
            quad: self.quad.clone(),
            warp_size: self.warp_size,
            source_file: self.source_file.clone(),
        }
    }
}

impl std::fmt::Debug for SidePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SidePayload")
            .field("image_len", &self.image.len())
            .field("source_file", &self.source_file)
            .field("bounding_box", &self.bounding_box)
            .field("quad", &self.quad)
            .field("warp_size", &self.warp_size)
            .finish()
    }
}

/// Request sent to the export renderer for one pair.
#[derive(Debug, Clone)]
pub struct PairRequest {
    pub pair_id: String,
    pub format: OutputFormat,
    pub quality: Quality,
    pub include_warped: bool,
    pub front: SidePayload,
    pub back: Option<SidePayload>,
}

/// One encoded output image.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for RenderedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedImage")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Renderer response for one pair.
#[derive(Debug, Clone)]
pub struct PairResult {
    pub pair_id: String,
    pub images: Vec<RenderedImage>,
}

// -- Progress -----------------------------------------------------------------

/// Coarse phase of an export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStage {
    Initializing,
    Processing,
    Writing,
    Finalizing,
}

/// Progress notification emitted by the export orchestrator.
///
/// `completed` never decreases within a run and equals `total` once a
/// successful run finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub stage: ExportStage,
    pub completed: u64,
    pub total: u64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pair_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pair_index: Option<usize>,
}

// -- Manifest -----------------------------------------------------------------

/// Geometry provenance of one side, in original-image coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideManifest {
    pub bbox: BoundingBox,
    pub quad: Vec<Point>,
    pub warp_size: WarpSize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_file: Option<String>,
}

/// `MANIFEST.json` written next to a pair's images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairManifest {
    pub pair_id: String,
    pub card_name: String,
    pub set_name: String,
    pub folder_path: String,
    pub files: Vec<String>,
    pub front: SideManifest,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub back: Option<SideManifest>,
}
