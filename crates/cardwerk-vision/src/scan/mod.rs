// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Card scanning: edge/contour detection of card outlines and the plane
// geometry behind it.

pub mod detector;
pub mod geometry;

pub use detector::CardDetector;
pub use geometry::{RotatedRect, order_quad_points};
