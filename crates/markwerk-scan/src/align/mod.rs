// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Alignment locator — finds four reference points on a raw scan so it can be
// rectified into template space.
//
// Detection is an ordered list of strategies, each a pure function from the
// grayscale scan to an optional quadrilateral. Each strategy does its own
// preprocessing. The first strategy that succeeds wins.

pub mod border;
pub mod markers;

use image::{DynamicImage, GrayImage};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use markwerk_core::{AlignmentMethod, Quad, ScanConfig};
use tracing::{info, instrument, warn};

use crate::trace::TraceSink;

pub use border::BorderSearch;
pub use markers::MarkerSearch;

/// One way of finding the alignment quadrilateral.
pub trait AlignmentStrategy: Send + Sync {
    fn method(&self) -> AlignmentMethod;

    /// Return the ordered corners (`[tl, tr, br, bl]`) or `None`.
    fn locate(&self, gray: &GrayImage, trace: &dyn TraceSink) -> Option<Quad>;
}

/// A successful alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    pub method: AlignmentMethod,
    pub corners: Quad,
}

/// Runs alignment strategies in order.
pub struct AlignmentLocator {
    strategies: Vec<Box<dyn AlignmentStrategy>>,
}

impl AlignmentLocator {
    /// Marker search followed by the border fallback.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            strategies: vec![
                Box::new(MarkerSearch::from_config(config)),
                Box::new(BorderSearch::from_config(config)),
            ],
        }
    }

    /// A locator with an explicit strategy list.
    pub fn with_strategies(strategies: Vec<Box<dyn AlignmentStrategy>>) -> Self {
        Self { strategies }
    }

    /// Find the alignment quadrilateral in source-image coordinates.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn locate(&self, image: &DynamicImage, trace: &dyn TraceSink) -> Option<Alignment> {
        let gray = image.to_luma8();

        for strategy in &self.strategies {
            if let Some(corners) = strategy.locate(&gray, trace) {
                let method = strategy.method();
                info!(?method, ?corners, "Alignment found");
                trace.alignment(Some((method, &corners)));
                return Some(Alignment { method, corners });
            }
        }

        warn!("No alignment markers or form border found; continuing unrectified");
        trace.alignment(None);
        None
    }
}

/// Outer contours of top-level foreground components.
pub(crate) fn external_contours(mask: &GrayImage) -> Vec<Contour<i32>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .collect()
}

/// Douglas-Peucker simplification of a closed contour, with the tolerance
/// given as a fraction of the perimeter.
///
/// The simplifier always keeps the first point, so the contour is first
/// rotated to start at its top-left extreme (minimum `x + y`), which is a
/// true corner of any mildly rotated quadrilateral. Returns `None` for
/// contours with no length or a non-positive tolerance.
pub(crate) fn simplify_closed(points: &[Point<i32>], epsilon_fraction: f64) -> Option<Vec<Point<i32>>> {
    let perimeter = arc_length(points, true);
    let epsilon = epsilon_fraction * perimeter;
    if !(epsilon.is_finite() && epsilon > 0.0) {
        return None;
    }

    let start = points
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| p.x + p.y)
        .map(|(index, _)| index)?;
    let mut anchored = Vec::with_capacity(points.len());
    anchored.extend_from_slice(&points[start..]);
    anchored.extend_from_slice(&points[..start]);

    Some(approximate_polygon_dp(&anchored, epsilon, true))
}
