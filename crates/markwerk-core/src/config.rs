// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan tuning configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MarkwerkError, Result};

/// Heuristic parameters of the recognition pipeline.
///
/// The defaults are tuned for print-scan resolution forms with solid square
/// alignment markers. Missing fields in a JSON file fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Gaussian blur sigma applied before every threshold (1.1 matches a 5x5
    /// kernel).
    pub blur_sigma: f32,
    /// Exclusive bounds on marker contour area, in pixels.
    pub marker_min_area: f64,
    pub marker_max_area: f64,
    /// Inclusive bounds on the vertex count of a marker's approximated polygon.
    pub marker_min_vertices: usize,
    pub marker_max_vertices: usize,
    /// Inclusive bounds on a marker's bounding-box aspect ratio (w / h).
    pub marker_min_aspect: f64,
    pub marker_max_aspect: f64,
    /// Polygon approximation tolerance for markers, as a fraction of perimeter.
    pub marker_approx_epsilon: f64,
    /// Radius of the square structuring element used to open the marker mask.
    pub open_radius: u8,
    /// Canny hysteresis thresholds for the border fallback.
    pub canny_low: f32,
    pub canny_high: f32,
    /// How many of the largest edge contours the border fallback inspects.
    pub border_candidates: usize,
    /// Polygon approximation tolerance for the border, as a fraction of perimeter.
    pub border_approx_epsilon: f64,
    /// Minimum border area as a fraction of the whole image.
    pub border_min_area_fraction: f64,
    /// Filename prefix of the processed image written to the output directory.
    pub output_prefix: String,
    /// Draw per-bubble verdict circles on the processed image.
    pub annotate: bool,
    /// Report multi-marked answer rows as `"?"` instead of `""`.
    pub mark_ambiguous_answers: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            marker_min_area: 50.0,
            marker_max_area: 10_000.0,
            marker_min_vertices: 4,
            marker_max_vertices: 8,
            marker_min_aspect: 0.7,
            marker_max_aspect: 1.3,
            marker_approx_epsilon: 0.04,
            open_radius: 2,
            canny_low: 75.0,
            canny_high: 200.0,
            border_candidates: 5,
            border_approx_epsilon: 0.02,
            border_min_area_fraction: 0.2,
            output_prefix: "processed_".into(),
            annotate: true,
            mark_ambiguous_answers: false,
        }
    }
}

impl ScanConfig {
    /// Read and validate a scan config from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.blur_sigma.is_finite() && self.blur_sigma > 0.0) {
            return Err(MarkwerkError::InvalidConfig(format!(
                "blur_sigma must be positive, found {}",
                self.blur_sigma
            )));
        }
        for (name, epsilon) in [
            ("marker_approx_epsilon", self.marker_approx_epsilon),
            ("border_approx_epsilon", self.border_approx_epsilon),
        ] {
            if !(epsilon.is_finite() && epsilon > 0.0) {
                return Err(MarkwerkError::InvalidConfig(format!(
                    "{name} must be positive, found {epsilon}"
                )));
            }
        }
        if self.marker_min_area >= self.marker_max_area {
            return Err(MarkwerkError::InvalidConfig(
                "marker_min_area must be below marker_max_area".into(),
            ));
        }
        if self.marker_min_vertices > self.marker_max_vertices {
            return Err(MarkwerkError::InvalidConfig(
                "marker_min_vertices must not exceed marker_max_vertices".into(),
            ));
        }
        if self.marker_min_aspect > self.marker_max_aspect {
            return Err(MarkwerkError::InvalidConfig(
                "marker_min_aspect must not exceed marker_max_aspect".into(),
            ));
        }
        if self.canny_low > self.canny_high {
            return Err(MarkwerkError::InvalidConfig(
                "canny_low must not exceed canny_high".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.border_min_area_fraction) {
            return Err(MarkwerkError::InvalidConfig(
                "border_min_area_fraction must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ScanConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ScanConfig = serde_json::from_str(r#"{"annotate": false}"#).unwrap();
        assert!(!config.annotate);
        assert_eq!(config.output_prefix, "processed_");
        assert_eq!(config.border_candidates, 5);
    }

    #[test]
    fn rejects_inverted_area_bounds() {
        let config = ScanConfig {
            marker_min_area: 500.0,
            marker_max_area: 100.0,
            ..ScanConfig::default()
        };
        assert!(matches!(config.validate(), Err(MarkwerkError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_zero_sigma() {
        let config = ScanConfig {
            blur_sigma: 0.0,
            ..ScanConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_approximation_epsilon() {
        let zero = ScanConfig {
            marker_approx_epsilon: 0.0,
            ..ScanConfig::default()
        };
        assert!(matches!(
            zero.validate(),
            Err(MarkwerkError::InvalidConfig(msg)) if msg.contains("marker_approx_epsilon")
        ));

        let negative = ScanConfig {
            border_approx_epsilon: -0.02,
            ..ScanConfig::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(MarkwerkError::InvalidConfig(msg)) if msg.contains("border_approx_epsilon")
        ));

        let nan = ScanConfig {
            border_approx_epsilon: f64::NAN,
            ..ScanConfig::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn zero_epsilon_in_json_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");
        std::fs::write(&path, r#"{"marker_approx_epsilon": 0.0}"#).unwrap();
        assert!(matches!(ScanConfig::from_path(&path), Err(MarkwerkError::InvalidConfig(_))));
    }
}
