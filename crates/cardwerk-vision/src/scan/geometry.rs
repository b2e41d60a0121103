// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plane geometry for card outlines: minimum-area rotated rectangle over a
// convex hull, and quad ordering.

use cardwerk_core::Point;

/// A rectangle of arbitrary orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: Point,
    /// Extent along the rectangle's own x axis.
    pub width: f64,
    /// Extent along the rectangle's own y axis.
    pub height: f64,
    /// Rotation of the x axis in degrees, normalised to `(-45, 45]`.
    pub angle: f64,
}

impl RotatedRect {
    /// Corners from rotating the half-extents by `angle` around `center`,
    /// in no particular order.
    pub fn corners(&self) -> [Point; 4] {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let (hw, hh) = (self.width / 2.0, self.height / 2.0);
        let at = |sx: f64, sy: f64| {
            Point::new(
                self.center.x + sx * hw * cos - sy * hh * sin,
                self.center.y + sx * hw * sin + sy * hh * cos,
            )
        };
        [at(-1.0, -1.0), at(1.0, -1.0), at(1.0, 1.0), at(-1.0, 1.0)]
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Minimum-area enclosing rectangle by rotating calipers.
///
/// `hull` must be a convex polygon with its vertices in order, as returned by
/// `imageproc::geometry::convex_hull`. Returns `None` for an empty hull; a
/// single point or a segment gives a rectangle with a zero extent.
pub fn min_area_rect(hull: &[Point]) -> Option<RotatedRect> {
    match hull.len() {
        0 => return None,
        1 => {
            return Some(RotatedRect {
                center: hull[0],
                width: 0.0,
                height: 0.0,
                angle: 0.0,
            });
        }
        _ => {}
    }

    let mut best: Option<(f64, RotatedRect)> = None;
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len = dx.hypot(dy);
        if len == 0.0 {
            continue;
        }
        let u = (dx / len, dy / len);
        let v = (-u.1, u.0);

        let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in hull {
            let pu = p.x * u.0 + p.y * u.1;
            let pv = p.x * v.0 + p.y * v.1;
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }

        let (width, height) = (max_u - min_u, max_v - min_v);
        let area = width * height;
        if best.as_ref().is_some_and(|(a, _)| *a <= area) {
            continue;
        }
        let (cu, cv) = ((min_u + max_u) / 2.0, (min_v + max_v) / 2.0);
        let rect = RotatedRect {
            center: Point::new(cu * u.0 + cv * v.0, cu * u.1 + cv * v.1),
            width,
            height,
            angle: u.1.atan2(u.0).to_degrees(),
        };
        best = Some((area, rect));
    }

    best.map(|(_, rect)| normalise(rect))
}

/// Rotate the axis labelling by quarter turns until the angle lies in
/// `(-45, 45]`, so `width` is always the more horizontal extent.
fn normalise(mut rect: RotatedRect) -> RotatedRect {
    while rect.angle > 45.0 {
        rect.angle -= 90.0;
        std::mem::swap(&mut rect.width, &mut rect.height);
    }
    while rect.angle <= -45.0 {
        rect.angle += 90.0;
        std::mem::swap(&mut rect.width, &mut rect.height);
    }
    rect
}

/// Order four points as `[top_left, top_right, bottom_right, bottom_left]`.
///
/// The smallest `x + y` is top-left and the largest bottom-right; of the
/// remaining two, the one further right is top-right. The result does not
/// depend on the input order, so ordering twice is a no-op.
pub fn order_quad_points(points: [Point; 4]) -> [Point; 4] {
    let mut sorted = points;
    sorted.sort_by(|a, b| {
        (a.x + a.y)
            .total_cmp(&(b.x + b.y))
            .then(a.x.total_cmp(&b.x))
            .then(a.y.total_cmp(&b.y))
    });
    let (top_left, bottom_right) = (sorted[0], sorted[3]);
    let mut middle = [sorted[1], sorted[2]];
    middle.sort_by(|a, b| a.x.total_cmp(&b.x).then(b.y.total_cmp(&a.y)));
    let (bottom_left, top_right) = (middle[0], middle[1]);
    [top_left, top_right, bottom_right, bottom_left]
}
