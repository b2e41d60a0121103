// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Card detector: locates card-shaped regions in a working image.
//
// Pipeline: grayscale → Gaussian blur → Canny → morphological close →
// outer contours → area filter → convex hull → minimum-area rectangle per
// contour.

use cardwerk_core::config::DetectorConfig;
use cardwerk_core::error::{CardwerkError, Result};
use cardwerk_core::{BoundingBox, DetectedCard, Point, WarpSize};
use image::{DynamicImage, GrayImage};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{contour_area, convex_hull};
use imageproc::morphology::close;
use tracing::{debug, info, instrument};

use super::geometry::{self, order_quad_points};

/// Finds card outlines with fixed edge/contour thresholds.
///
/// Output is deterministic for a given image and configuration, and always
/// sorted left to right by `center_norm.x`.
#[derive(Debug, Clone, Default)]
pub struct CardDetector {
    config: DetectorConfig,
}

impl CardDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect cards in an unnamed image.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectedCard>> {
        self.detect_in("image", image)
    }

    /// Detect cards in `image`; `file` names the photo in errors and logs.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn detect_in(&self, file: &str, image: &DynamicImage) -> Result<Vec<DetectedCard>> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(CardwerkError::DetectionFailure {
                file: file.to_string(),
                detail: format!("image has no pixels ({width}x{height})"),
            });
        }

        let edges = self.edge_map(image);
        let contours = find_contours::<i32>(&edges);
        let min_area = self.config.min_area(width, height);
        debug!(contours = contours.len(), min_area, "Contours extracted");

        let mut cards: Vec<DetectedCard> = contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .filter_map(|c| card_from_contour(c, min_area, width, height))
            .collect();
        cards.sort_by(|a, b| a.center_norm.x.total_cmp(&b.center_norm.x));

        info!(cards = cards.len(), "Card detection complete");
        Ok(cards)
    }

    /// Grayscale, blur, Canny and close, producing a binary edge map in which
    /// card borders form closed rings.
    fn edge_map(&self, image: &DynamicImage) -> GrayImage {
        let gray = image.to_luma8();
        let blurred = gaussian_blur_f32(&gray, self.config.blur_sigma());
        let edges = canny(&blurred, self.config.canny_low, self.config.canny_high);
        close(&edges, Norm::LInf, self.config.close_radius())
    }
}

/// Geometry for one contour, or `None` when it is below the area threshold.
fn card_from_contour(
    contour: &Contour<i32>,
    min_area: f64,
    width: u32,
    height: u32,
) -> Option<DetectedCard> {
    let area = contour_area(&contour.points).abs();
    if area < min_area {
        return None;
    }

    let hull: Vec<Point> = convex_hull(contour.points.as_slice())
        .iter()
        .map(|p| Point::new(p.x as f64, p.y as f64))
        .collect();
    let rect = geometry::min_area_rect(&hull)?;
    let (max_x, max_y) = (width as f64 - 1.0, height as f64 - 1.0);
    let quad = order_quad_points(
        rect.corners()
            .map(|p| Point::new(p.x.clamp(0.0, max_x), p.y.clamp(0.0, max_y))),
    );

    let bounding_box = bounding_rect(contour);
    debug!(
        area,
        angle = rect.angle,
        rect_width = rect.width,
        rect_height = rect.height,
        x = bounding_box.x,
        y = bounding_box.y,
        "Card candidate accepted"
    );

    Some(DetectedCard {
        bounding_box,
        quad: quad.to_vec(),
        center_norm: Point::new(
            rect.center.x / width as f64,
            rect.center.y / height as f64,
        ),
        warp_size: WarpSize::from_dimensions(rect.width, rect.height),
    })
}

/// Smallest upright integer rectangle containing every contour pixel.
fn bounding_rect(contour: &Contour<i32>) -> BoundingBox {
    if contour.points.is_empty() {
        return BoundingBox::new(0, 0, 1, 1);
    }
    let mut min = (i32::MAX, i32::MAX);
    let mut max = (i32::MIN, i32::MIN);
    for p in &contour.points {
        min = (min.0.min(p.x), min.1.min(p.y));
        max = (max.0.max(p.x), max.1.max(p.y));
    }
    BoundingBox::new(min.0, min.1, max.0 - min.0 + 1, max.1 - min.1 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};
    use imageproc::point::Point as PixelPoint;

    use crate::scan::geometry::RotatedRect;

    fn canvas(width: u32, height: u32) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([0u8]))
    }

    fn fill(img: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Luma([255u8]));
            }
        }
    }

    /// A blank image has no edges, so no cards.
    #[test]
    fn black_image_yields_nothing() {
        let img = DynamicImage::ImageLuma8(canvas(1000, 1000));
        let cards = CardDetector::default().detect(&img).unwrap();
        assert!(cards.is_empty());
    }

    /// One large white card on black: exactly one detection whose warp size
    /// matches the card within a few pixels.
    #[test]
    fn single_rectangle_is_detected() {
        let mut img = canvas(1000, 1000);
        fill(&mut img, 200, 250, 800, 750);
        let cards = CardDetector::default()
            .detect(&DynamicImage::ImageLuma8(img))
            .unwrap();

        assert_eq!(cards.len(), 1);
        let card = &cards[0];
        assert!(card.warp_size.width.abs_diff(600) <= 6, "{:?}", card.warp_size);
        assert!(card.warp_size.height.abs_diff(500) <= 6, "{:?}", card.warp_size);
        assert!((card.center_norm.x - 0.5).abs() < 0.01);
        assert!((card.center_norm.y - 0.5).abs() < 0.01);
        assert_eq!(card.quad.len(), 4);
        assert!(card.quad.iter().all(|p| p.x >= 0.0 && p.y >= 0.0));
        assert!(card.bounding_box.x.abs_diff(200) <= 4);
        assert!(card.bounding_box.y.abs_diff(250) <= 4);
    }

    /// A card turned 20 degrees: the rotated rectangle recovers its true
    /// size, and the quad starts at the card's own top-left corner and runs
    /// clockwise.
    #[test]
    fn rotated_card_keeps_true_size_and_corner_order() {
        let card = RotatedRect {
            center: Point::new(1000.0, 1000.0),
            width: 700.0,
            height: 1000.0,
            angle: 20.0,
        };
        let (sin, cos) = card.angle.to_radians().sin_cos();
        let mut img = canvas(2000, 2000);
        for y in 0..2000u32 {
            for x in 0..2000u32 {
                let (dx, dy) = (x as f64 - card.center.x, y as f64 - card.center.y);
                let u = dx * cos + dy * sin;
                let v = -dx * sin + dy * cos;
                if u.abs() <= card.width / 2.0 && v.abs() <= card.height / 2.0 {
                    img.put_pixel(x, y, Luma([255u8]));
                }
            }
        }

        let cards = CardDetector::default()
            .detect(&DynamicImage::ImageLuma8(img))
            .unwrap();
        assert_eq!(cards.len(), 1);
        let found = &cards[0];
        assert!(found.warp_size.width.abs_diff(700) <= 8, "{:?}", found.warp_size);
        assert!(found.warp_size.height.abs_diff(1000) <= 8, "{:?}", found.warp_size);
        assert!((found.center_norm.x - 0.5).abs() < 0.01);
        assert!((found.center_norm.y - 0.5).abs() < 0.01);

        // Roughly (842, 410), (1500, 650), (1158, 1590), (500, 1350).
        let expected = order_quad_points(card.corners());
        assert_eq!(found.quad.len(), 4);
        for (got, want) in found.quad.iter().zip(expected.iter()) {
            assert!(
                (got.x - want.x).abs() <= 6.0 && (got.y - want.y).abs() <= 6.0,
                "{got:?} vs {want:?}"
            );
        }

        // Clockwise on screen: positive shoelace sum with y pointing down.
        let q = &found.quad;
        let signed: f64 = (0..4)
            .map(|i| {
                let (a, b) = (q[i], q[(i + 1) % 4]);
                a.x * b.y - b.x * a.y
            })
            .sum();
        assert!(signed > 0.0);
    }

    #[test]
    fn empty_contour_has_unit_bounding_box() {
        let contour = Contour {
            points: Vec::<PixelPoint<i32>>::new(),
            border_type: BorderType::Outer,
            parent: None,
        };
        assert_eq!(bounding_rect(&contour), BoundingBox::new(0, 0, 1, 1));
    }

    #[test]
    fn bounding_rect_spans_every_point() {
        let contour = Contour {
            points: vec![
                PixelPoint::new(5, 9),
                PixelPoint::new(12, 3),
                PixelPoint::new(7, 20),
            ],
            border_type: BorderType::Outer,
            parent: None,
        };
        assert_eq!(bounding_rect(&contour), BoundingBox::new(5, 3, 8, 18));
    }

    /// Small fragments fall below the resolution-adaptive area threshold.
    #[test]
    fn small_shapes_are_filtered() {
        let mut img = canvas(1000, 1000);
        fill(&mut img, 100, 100, 300, 300);
        let cards = CardDetector::default()
            .detect(&DynamicImage::ImageLuma8(img))
            .unwrap();
        assert!(cards.is_empty());
    }

    /// Two cards side by side come back ordered left to right.
    #[test]
    fn cards_are_ordered_left_to_right() {
        let mut img = canvas(2000, 1000);
        fill(&mut img, 1100, 150, 1800, 850);
        fill(&mut img, 150, 150, 850, 850);
        let cards = CardDetector::default()
            .detect(&DynamicImage::ImageLuma8(img))
            .unwrap();
        assert_eq!(cards.len(), 2);
        assert!(cards[0].center_norm.x < cards[1].center_norm.x);
        assert!(cards[0].bounding_box.x < 1000);
    }

    /// Colour input goes through the same grayscale path.
    #[test]
    fn colour_image_is_accepted() {
        let mut img = RgbImage::from_pixel(1000, 1000, Rgb([20, 30, 20]));
        for y in 200..800 {
            for x in 150..850 {
                img.put_pixel(x, y, Rgb([240, 235, 220]));
            }
        }
        let cards = CardDetector::default()
            .detect(&DynamicImage::ImageRgb8(img))
            .unwrap();
        assert_eq!(cards.len(), 1);
    }

    #[test]
    fn empty_image_is_a_detection_failure() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        assert!(matches!(
            CardDetector::default().detect_in("front.jpg", &img),
            Err(CardwerkError::DetectionFailure { .. })
        ));
    }
}
