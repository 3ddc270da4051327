// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// markwerk-scan — Recognition pipeline for Markwerk answer sheets.
//
// Locates the alignment quadrilateral (fiducial markers, falling back to the
// printed form border), rectifies the scan into template space, measures the
// fill ratio of every bubble and interprets the student-number and answer
// grids with per-field confidence scores.

pub mod align;
pub mod annotate;
pub mod fields;
pub mod geometry;
pub mod grid;
pub mod processor;
pub mod rectify;
pub mod threshold;
pub mod trace;

#[cfg(any(test, feature = "synthetic"))]
pub mod synthetic;

// Re-export the primary entry points so callers can use `markwerk_scan::FormProcessor` etc.
pub use align::{Alignment, AlignmentLocator, AlignmentStrategy, BorderSearch, MarkerSearch};
pub use geometry::{four_point_transform, order_points};
pub use grid::{CellGrid, FillGrid, detect_bubbles_in_grid, measure_fill_ratios};
pub use processor::{FormProcessor, PageAnalysis};
pub use trace::{DirectoryTrace, NoopTrace, TraceSink};
