// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Border fallback — uses the sheet's own outer outline as the alignment
// quadrilateral when no markers are visible.

use image::GrayImage;
use imageproc::edges::canny;
use imageproc::point::Point;
use markwerk_core::{AlignmentMethod, Quad, ScanConfig};
use tracing::debug;

use super::{AlignmentStrategy, external_contours, simplify_closed};
use crate::geometry::{order_points, polygon_area};
use crate::trace::TraceSink;

/// Looks for a large four-sided outline among the biggest edge contours.
#[derive(Debug, Clone)]
pub struct BorderSearch {
    canny_low: f32,
    canny_high: f32,
    candidates: usize,
    approx_epsilon: f64,
    min_area_fraction: f64,
}

impl BorderSearch {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            canny_low: config.canny_low,
            canny_high: config.canny_high,
            candidates: config.border_candidates,
            approx_epsilon: config.border_approx_epsilon,
            min_area_fraction: config.border_min_area_fraction,
        }
    }
}

impl AlignmentStrategy for BorderSearch {
    fn method(&self) -> AlignmentMethod {
        AlignmentMethod::Border
    }

    fn locate(&self, gray: &GrayImage, trace: &dyn TraceSink) -> Option<Quad> {
        // canny smooths internally.
        let edges = canny(gray, self.canny_low, self.canny_high);
        trace.mask("border_edges", &edges);

        let mut contours: Vec<(f64, Vec<Point<i32>>)> = external_contours(&edges)
            .into_iter()
            .map(|c| (polygon_area(&c.points), c.points))
            .collect();
        contours.sort_by(|a, b| b.0.total_cmp(&a.0));

        let min_area = gray.width() as f64 * gray.height() as f64 * self.min_area_fraction;
        for (area, points) in contours.into_iter().take(self.candidates) {
            let Some(approx) = simplify_closed(&points, self.approx_epsilon) else {
                continue;
            };
            debug!(area, vertices = approx.len(), "Border candidate");
            if approx.len() == 4 && area > min_area {
                let corners: Vec<(f32, f32)> = approx.iter().map(|p| (p.x as f32, p.y as f32)).collect();
                return order_points(&corners);
            }
        }

        None
    }
}
