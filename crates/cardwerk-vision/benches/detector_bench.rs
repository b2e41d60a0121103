// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the cardwerk-vision crate: card detection on a
// synthetic photo and rendering of one front/back pair.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, GrayImage, Luma};

use cardwerk_core::{BoundingBox, DetectedCard, OutputFormat, PairRequest, Quality, SidePayload};
use cardwerk_vision::{CardDetector, ExportRenderer, codec};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// 1200x900 dark background with two light cards side by side.
fn two_card_photo() -> DynamicImage {
    let (width, height) = (1200u32, 900u32);
    let mut img = GrayImage::from_pixel(width, height, Luma([30u8]));
    for (x0, x1) in [(80u32, 560u32), (640, 1120)] {
        for y in 120..780 {
            for x in x0..x1 {
                img.put_pixel(x, y, Luma([235u8]));
            }
        }
    }
    DynamicImage::ImageLuma8(img)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Full detection pipeline (blur, Canny, close, contours, rectangles).
fn bench_detect(c: &mut Criterion) {
    let photo = two_card_photo();
    let detector = CardDetector::default();

    c.bench_function("detect (1200x900, two cards)", |b| {
        b.iter(|| {
            let cards = detector.detect(black_box(&photo));
            black_box(cards.ok());
        });
    });
}

/// Listing, quadrants and warp for a front-only pair.
fn bench_render_pair(c: &mut Criterion) {
    let photo = two_card_photo();
    let blob = match codec::encode_jpeg(&photo, 92) {
        Ok(bytes) => bytes,
        Err(err) => panic!("fixture encoding failed: {err}"),
    };
    let card = DetectedCard::from_rect(BoundingBox::new(80, 120, 480, 660), 1200, 900);
    let request = PairRequest {
        pair_id: "pair-1".into(),
        format: OutputFormat::Jpeg,
        quality: Quality::from_ui(92),
        include_warped: true,
        front: SidePayload::from_card(blob, None, &card),
        back: None,
    };
    let renderer = ExportRenderer::new();

    c.bench_function("process_pair (front only, jpeg)", |b| {
        b.iter(|| black_box(renderer.process_pair(black_box(&request)).ok()));
    });
}

criterion_group!(benches, bench_detect, bench_render_pair);
criterion_main!(benches);
