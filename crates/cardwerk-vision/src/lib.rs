// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardwerk-vision: Image work for Cardwerk.
//
// Decodes uploaded photos into working copies, detects card outlines in
// them, and renders the listing/quadrant/warped crops for export.

pub mod codec;
pub mod decode;
#[cfg(feature = "heif")]
pub mod heif;
pub mod render;
pub mod scan;

// Re-export the primary structs so callers can use `cardwerk_vision::CardDetector` etc.
pub use decode::{DecodedImage, Decoder, HeifConverter, InputFile, NoHeifConverter};
#[cfg(feature = "heif")]
pub use heif::LibHeifConverter;
pub use render::{ExportRenderer, clamp_rect, quadrant_rects};
pub use scan::CardDetector;
