// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fiducial marker search — solid, roughly square blobs near the sheet corners.

use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::open;
use markwerk_core::{AlignmentMethod, Quad, ScanConfig};
use tracing::debug;

use super::{AlignmentStrategy, external_contours, simplify_closed};
use crate::geometry::{bounding_box, order_points, polygon_area, polygon_centroid};
use crate::threshold::ink_mask;
use crate::trace::TraceSink;

/// Finds alignment markers as compact dark blobs.
///
/// The smoothed scan is thresholded at its Otsu level and the ink mask is
/// opened with a square structuring element so that markers touching the
/// form border or stray strokes come loose. Each outer contour
/// is then filtered by area, by the vertex count of its polygon
/// approximation (4 for squares, up to 8 for circles) and by bounding-box
/// aspect ratio. Surviving centroids are the candidates; with more than four,
/// the outermost four by the corner-ordering rule are used. That reduction
/// can pick the wrong blob when false positives cluster near a corner.
#[derive(Debug, Clone)]
pub struct MarkerSearch {
    blur_sigma: f32,
    min_area: f64,
    max_area: f64,
    min_vertices: usize,
    max_vertices: usize,
    min_aspect: f64,
    max_aspect: f64,
    approx_epsilon: f64,
    open_radius: u8,
}

impl MarkerSearch {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            blur_sigma: config.blur_sigma,
            min_area: config.marker_min_area,
            max_area: config.marker_max_area,
            min_vertices: config.marker_min_vertices,
            max_vertices: config.marker_max_vertices,
            min_aspect: config.marker_min_aspect,
            max_aspect: config.marker_max_aspect,
            approx_epsilon: config.marker_approx_epsilon,
            open_radius: config.open_radius,
        }
    }

    /// Centroids of every blob that passes the marker filters.
    pub fn candidates(&self, gray: &GrayImage, trace: &dyn TraceSink) -> Vec<(f32, f32)> {
        let mask = ink_mask(gray, self.blur_sigma);
        let opened = if self.open_radius > 0 {
            open(&mask, Norm::LInf, self.open_radius)
        } else {
            mask
        };
        trace.mask("alignment", &opened);

        let contours = external_contours(&opened);
        debug!(contours = contours.len(), "Marker contours extracted");

        let mut candidates = Vec::new();
        for contour in &contours {
            let area = polygon_area(&contour.points);
            if area <= self.min_area || area >= self.max_area {
                continue;
            }

            let Some(approx) = simplify_closed(&contour.points, self.approx_epsilon) else {
                continue;
            };
            if !(self.min_vertices..=self.max_vertices).contains(&approx.len()) {
                continue;
            }

            let Some((_, _, w, h)) = bounding_box(&approx) else {
                continue;
            };
            let aspect = w as f64 / h as f64;
            if !(self.min_aspect..=self.max_aspect).contains(&aspect) {
                continue;
            }

            if let Some(centroid) = polygon_centroid(&contour.points) {
                debug!(?centroid, area, aspect, vertices = approx.len(), "Marker candidate");
                candidates.push(centroid);
            }
        }

        candidates
    }
}

impl AlignmentStrategy for MarkerSearch {
    fn method(&self) -> AlignmentMethod {
        AlignmentMethod::Markers
    }

    fn locate(&self, gray: &GrayImage, trace: &dyn TraceSink) -> Option<Quad> {
        let candidates = self.candidates(gray, trace);
        debug!(count = candidates.len(), "Marker candidates");
        if candidates.len() < 4 {
            return None;
        }
        order_points(&candidates)
    }
}
