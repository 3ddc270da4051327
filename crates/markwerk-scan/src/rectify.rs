// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rectification — the seam where scan geometry becomes template geometry.

use std::borrow::Cow;

use image::DynamicImage;
use markwerk_core::Result;
use tracing::{info, instrument};

use crate::align::Alignment;
use crate::geometry::four_point_transform;

/// Warp the scan through the alignment quadrilateral, or pass it through
/// unchanged when alignment failed.
///
/// All template regions are defined in the rectified space, so every field
/// read downstream depends on this step.
#[instrument(skip_all, fields(aligned = alignment.is_some()))]
pub fn rectify<'a>(image: &'a DynamicImage, alignment: Option<&Alignment>) -> Result<Cow<'a, DynamicImage>> {
    match alignment {
        Some(alignment) => {
            let warped = four_point_transform(image, &alignment.corners)?;
            info!(
                from_w = image.width(),
                from_h = image.height(),
                to_w = warped.width(),
                to_h = warped.height(),
                "Scan rectified"
            );
            Ok(Cow::Owned(warped))
        }
        None => Ok(Cow::Borrowed(image)),
    }
}
