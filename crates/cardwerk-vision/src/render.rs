// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Export renderer: turns one resolved front/back pair into the encoded
// listing, quadrant and warped crops.

use cardwerk_core::error::{CardwerkError, Result};
use cardwerk_core::{
    BoundingBox, OutputFormat, PairRequest, PairResult, Point, Quadrant, Quality, RenderedImage,
    Side, SidePayload, WarpSize, listing_name, quadrant_name, warped_name,
};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, info, instrument, warn};

use crate::codec;

/// Share of the bounding box each corner detail crop covers, per axis.
pub const QUADRANT_FRACTION: f64 = 0.6;

/// Clamp a rectangle into `[0, width) x [0, height)`, keeping at least 1x1.
///
/// A rectangle already inside the image is returned unchanged.
pub fn clamp_rect(rect: BoundingBox, width: u32, height: u32) -> BoundingBox {
    let (w, h) = (width.max(1) as i32, height.max(1) as i32);
    let x = rect.x.clamp(0, w - 1);
    let y = rect.y.clamp(0, h - 1);
    let right = rect.right().clamp(x + 1, w);
    let bottom = rect.bottom().clamp(y + 1, h);
    BoundingBox::new(x, y, right - x, bottom - y)
}

/// The four corner detail rectangles of `rect`, in output order.
///
/// Each is `QUADRANT_FRACTION` of the clamped box per axis, anchored at one
/// corner and clamped again.
pub fn quadrant_rects(rect: BoundingBox, width: u32, height: u32) -> [(Quadrant, BoundingBox); 4] {
    let b = clamp_rect(rect, width, height);
    let qw = ((b.width as f64 * QUADRANT_FRACTION).floor() as i32).max(1);
    let qh = ((b.height as f64 * QUADRANT_FRACTION).floor() as i32).max(1);
    let (left, top) = (b.x, b.y);
    let (right, bottom) = (b.right() - qw, b.bottom() - qh);

    Quadrant::ALL.map(|q| {
        let (x, y) = match q {
            Quadrant::TopLeft => (left, top),
            Quadrant::TopRight => (right, top),
            Quadrant::BottomLeft => (left, bottom),
            Quadrant::BottomRight => (right, bottom),
        };
        (q, clamp_rect(BoundingBox::new(x, y, qw, qh), width, height))
    })
}

/// Map `quad` onto an upright `size` rectangle with a four-point homography.
///
/// Returns `None` when the quad is degenerate (no projective transform).
pub fn warp_card(image: &DynamicImage, quad: &[Point; 4], size: WarpSize) -> Option<RgbaImage> {
    let (w, h) = (size.width.max(1), size.height.max(1));
    let (dx, dy) = ((w - 1).max(1) as f32, (h - 1).max(1) as f32);
    let src = quad.map(|p| (p.x as f32, p.y as f32));
    let dst = [(0.0, 0.0), (dx, 0.0), (dx, dy), (0.0, dy)];

    let projection = Projection::from_control_points(src, dst)?;
    let input = image.to_rgba8();
    let mut output = RgbaImage::new(w, h);
    warp_into(
        &input,
        &projection,
        Interpolation::Bilinear,
        Rgba([255u8, 255, 255, 255]),
        &mut output,
    );
    Some(output)
}

/// Stateless renderer for export pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportRenderer;

impl ExportRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render every image of a pair.
    ///
    /// Order: front listing, front quadrants, front warp (when requested and
    /// the front has a four-point quad), then back listing and quadrants.
    /// Any failure aborts the whole pair.
    #[instrument(
        skip(self, request),
        fields(
            pair = %request.pair_id,
            format = ?request.format,
            include_warped = request.include_warped,
            has_back = request.back.is_some()
        )
    )]
    pub fn process_pair(&self, request: &PairRequest) -> Result<PairResult> {
        let mut images = Vec::new();
        let job = SideJob {
            pair_id: &request.pair_id,
            format: request.format,
            quality: request.quality,
        };

        job.render(Side::Front, &request.front, request.include_warped, &mut images)?;
        if let Some(back) = &request.back {
            job.render(Side::Back, back, false, &mut images)?;
        }

        info!(images = images.len(), "Pair rendered");
        Ok(PairResult {
            pair_id: request.pair_id.clone(),
            images,
        })
    }
}

/// Per-pair settings shared by both sides.
struct SideJob<'a> {
    pair_id: &'a str,
    format: OutputFormat,
    quality: Quality,
}

impl SideJob<'_> {
    fn failure(&self, detail: String) -> CardwerkError {
        CardwerkError::ExportFailure {
            pair: self.pair_id.to_string(),
            detail,
        }
    }

    fn encode(&self, name: String, image: &DynamicImage) -> Result<RenderedImage> {
        let bytes = codec::encode(image, self.format, self.quality)
            .map_err(|err| self.failure(format!("{name} could not be encoded: {err}")))?;
        Ok(RenderedImage { name, bytes })
    }

    // The decoded bitmap is dropped when this returns, on every path.
    fn render(
        &self,
        side: Side,
        payload: &SidePayload,
        warp: bool,
        out: &mut Vec<RenderedImage>,
    ) -> Result<()> {
        let image = codec::decode_bytes(&payload.image).map_err(|err| {
            self.failure(format!("{} image could not be decoded: {err}", side.prefix()))
        })?;
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(self.failure(format!("{} image is empty", side.prefix())));
        }

        let listing = clamp_rect(payload.bounding_box, width, height);
        debug!(
            side = side.prefix(),
            x = listing.x,
            y = listing.y,
            w = listing.width,
            h = listing.height,
            "Listing crop"
        );
        out.push(self.encode(listing_name(side, self.format), &crop(&image, listing))?);

        for (quadrant, rect) in quadrant_rects(payload.bounding_box, width, height) {
            out.push(self.encode(quadrant_name(side, quadrant, self.format), &crop(&image, rect))?);
        }

        if warp && side == Side::Front {
            match <[Point; 4]>::try_from(payload.quad.as_slice()) {
                Ok(quad) => {
                    let warped = warp_card(&image, &quad, payload.warp_size).ok_or_else(|| {
                        self.failure("card outline is degenerate; no perspective transform".into())
                    })?;
                    out.push(self.encode(warped_name(self.format), &DynamicImage::ImageRgba8(warped))?);
                }
                Err(_) => warn!(
                    points = payload.quad.len(),
                    "front outline is not a quad; skipping warp"
                ),
            }
        }
        Ok(())
    }
}

fn crop(image: &DynamicImage, rect: BoundingBox) -> DynamicImage {
    image.crop_imm(
        rect.x as u32,
        rect.y as u32,
        rect.width as u32,
        rect.height as u32,
    )
}
