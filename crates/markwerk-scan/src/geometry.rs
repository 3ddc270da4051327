// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Planar geometry helpers — corner ordering, polygon measures, and the
// four-point perspective warp used to rectify scanned sheets.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::geometry::{contour_area, oriented_contour_area};
use imageproc::point::Point;
use markwerk_core::{MarkwerkError, Quad, Result};
use tracing::{debug, instrument};

/// Pick the four corner points of a point set.
///
/// Image coordinates are y-down, so:
/// - top-left has the smallest `x + y`
/// - bottom-right has the largest `x + y`
/// - top-right has the smallest `y - x`
/// - bottom-left has the largest `y - x`
///
/// With exactly four points this relabels them; with more it selects the
/// extremal ones. Ties go to the earliest point. Returns `None` for an empty
/// slice. The rule is reliable for mildly rotated quadrilaterals and degrades
/// past roughly 45 degrees of rotation.
pub fn order_points(points: &[(f32, f32)]) -> Option<Quad> {
    let first = *points.first()?;
    let mut top_left = first;
    let mut bottom_right = first;
    let mut top_right = first;
    let mut bottom_left = first;

    for &(x, y) in &points[1..] {
        if x + y < top_left.0 + top_left.1 {
            top_left = (x, y);
        }
        if x + y > bottom_right.0 + bottom_right.1 {
            bottom_right = (x, y);
        }
        if y - x < top_right.1 - top_right.0 {
            top_right = (x, y);
        }
        if y - x > bottom_left.1 - bottom_left.0 {
            bottom_left = (x, y);
        }
    }

    Some([top_left, top_right, bottom_right, bottom_left])
}

/// Warp the quadrilateral spanned by `points` onto an upright rectangle.
///
/// The target width is the longer of the top and bottom edges and the target
/// height the longer of the left and right edges, each truncated to whole
/// pixels. The output is exactly that size. Grayscale input stays grayscale;
/// everything else is warped as RGB.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn four_point_transform(image: &DynamicImage, points: &[(f32, f32)]) -> Result<DynamicImage> {
    let [tl, tr, br, bl] = order_points(points)
        .ok_or_else(|| MarkwerkError::Geometry("no points to transform".into()))?;

    let width = distance(br, bl).floor().max(distance(tr, tl).floor()) as u32;
    let height = distance(tr, br).floor().max(distance(tl, bl).floor()) as u32;
    if width == 0 || height == 0 {
        return Err(MarkwerkError::Geometry(format!(
            "alignment quadrilateral collapses to {width}x{height}"
        )));
    }

    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    let dest: Quad = [(0.0, 0.0), (max_x, 0.0), (max_x, max_y), (0.0, max_y)];

    let projection = Projection::from_control_points([tl, tr, br, bl], dest).ok_or_else(|| {
        MarkwerkError::Geometry("no projective transform for the alignment quadrilateral".into())
    })?;

    debug!(width, height, ?tl, ?tr, ?br, ?bl, "Warping quadrilateral");

    let warped = match image {
        DynamicImage::ImageLuma8(gray) => {
            let mut output = GrayImage::new(width, height);
            warp_into(gray, &projection, Interpolation::Bilinear, Luma([255u8]), &mut output);
            DynamicImage::ImageLuma8(output)
        }
        other => {
            let rgb = other.to_rgb8();
            let mut output = RgbImage::new(width, height);
            warp_into(
                &rgb,
                &projection,
                Interpolation::Bilinear,
                Rgb([255u8, 255, 255]),
                &mut output,
            );
            DynamicImage::ImageRgb8(output)
        }
    };

    Ok(warped)
}

/// Euclidean distance between two points.
pub fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Area of a closed polygon.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    contour_area(points)
}

/// Centroid of a closed polygon (first-order moments over area).
///
/// Returns `None` for polygons with zero area, such as single pixels or
/// straight lines.
pub fn polygon_centroid(points: &[Point<i32>]) -> Option<(f32, f32)> {
    let area = oriented_contour_area(points);
    if area.abs() < f64::EPSILON {
        return None;
    }

    let n = points.len();
    let (mut cx, mut cy) = (0.0f64, 0.0f64);
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        let cross = p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
        cx += (p.x + q.x) as f64 * cross;
        cy += (p.y + q.y) as f64 * cross;
    }
    let scale = 1.0 / (6.0 * area);
    Some(((cx * scale) as f32, (cy * scale) as f32))
}

/// Inclusive pixel bounding box `(x, y, width, height)` of a point set.
pub fn bounding_box(points: &[Point<i32>]) -> Option<(i32, i32, u32, u32)> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some((
        min_x,
        min_y,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}
