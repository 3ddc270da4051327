// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Form templates — the declarative bubble layout of an answer sheet.
//
// A template config file maps template names to layouts. Everything is parsed
// into typed structs and validated once at load time so that a malformed
// layout is rejected before any pixel is touched.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MarkwerkError, Result};

/// Number of digit values a student-number column encodes (0 to 9).
pub const DIGIT_ROWS: u32 = 10;

/// Number of alignment markers a template must declare.
pub const ALIGNMENT_MARKER_COUNT: usize = 4;

/// Upper bound on any coordinate or extent in template space, in pixels.
/// Keeps all region and cell arithmetic far from `u32` overflow.
pub const MAX_TEMPLATE_EXTENT: u32 = 1 << 16;

/// Root of a template config file: `{ "templates": { <name>: <template> } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub templates: BTreeMap<String, Template>,
}

impl TemplateConfig {
    /// Parse and validate a template config from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a template config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Look up a template by name.
    pub fn template(&self, name: &str) -> Result<&Template> {
        self.templates
            .get(name)
            .ok_or_else(|| MarkwerkError::UnknownTemplate(name.to_string()))
    }

    /// Validate every template in the config.
    pub fn validate(&self) -> Result<()> {
        for (name, template) in &self.templates {
            template
                .validate()
                .map_err(|reason| MarkwerkError::InvalidTemplate(format!("{name}: {reason}")))?;
        }
        Ok(())
    }
}

/// A named form layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub alignment_markers: AlignmentMarkers,
    pub regions: Regions,
    pub detection_params: DetectionParams,
}

impl Template {
    /// Expected marker centres in template space.
    pub fn marker_positions(&self) -> &[MarkerPosition] {
        &self.alignment_markers.positions
    }

    pub fn student_number(&self) -> &RegionDescriptor {
        &self.regions.student_number
    }

    pub fn sections(&self) -> &[Section] {
        &self.regions.answers.sections
    }

    pub fn fill_threshold(&self) -> f32 {
        self.detection_params.bubble_fill_threshold
    }

    /// Check the structural invariants. Returns a human-readable reason on
    /// failure; [`TemplateConfig::validate`] attaches the template name.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let marker_count = self.alignment_markers.positions.len();
        if marker_count != ALIGNMENT_MARKER_COUNT {
            return Err(format!(
                "alignment_markers.positions must have {ALIGNMENT_MARKER_COUNT} entries, found {marker_count}"
            ));
        }

        let threshold = self.detection_params.bubble_fill_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(format!(
                "detection_params.bubble_fill_threshold must be within [0, 1], found {threshold}"
            ));
        }

        let student = &self.regions.student_number;
        student
            .validate()
            .map_err(|reason| format!("regions.student_number.{reason}"))?;
        if student.grid.rows != DIGIT_ROWS {
            return Err(format!(
                "regions.student_number.grid.rows must be {DIGIT_ROWS} (one per digit value), found {}",
                student.grid.rows
            ));
        }

        let mut subjects = HashSet::new();
        for (index, section) in self.regions.answers.sections.iter().enumerate() {
            let at = format!("regions.answers.sections[{index}]");
            if section.subject.trim().is_empty() {
                return Err(format!("{at}.subject must not be empty"));
            }
            if !subjects.insert(section.subject.as_str()) {
                return Err(format!("{at}.subject '{}' is duplicated", section.subject));
            }
            section
                .region
                .validate()
                .map_err(|reason| format!("{at}.{reason}"))?;
            if section.options.is_empty() {
                return Err(format!("{at}.options must not be empty"));
            }
            if section.region.grid.rows != section.question_count {
                return Err(format!(
                    "{at}.grid.rows ({}) must equal question_count ({})",
                    section.region.grid.rows, section.question_count
                ));
            }
            if section.region.grid.columns as usize != section.options.len() {
                return Err(format!(
                    "{at}.grid.columns ({}) must equal the number of options ({})",
                    section.region.grid.columns,
                    section.options.len()
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentMarkers {
    pub positions: Vec<MarkerPosition>,
}

/// Expected centre of an alignment marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerPosition {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Regions {
    pub student_number: RegionDescriptor,
    pub answers: AnswerRegion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRegion {
    pub sections: Vec<Section>,
}

/// A top-left anchored rectangle in rectified template space plus the bubble
/// grid laid out inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionDescriptor {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub grid: GridSpec,
}

impl RegionDescriptor {
    fn validate(&self) -> std::result::Result<(), String> {
        for (name, value) in [
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ] {
            if value > MAX_TEMPLATE_EXTENT {
                return Err(format!("{name} ({value}) exceeds {MAX_TEMPLATE_EXTENT}"));
            }
        }
        self.grid.validate().map_err(|reason| format!("grid: {reason}"))
    }
}

/// Bubble grid geometry, relative to the top-left corner of its region.
///
/// The centre of cell `(row, col)` sits at
/// `(col * col_spacing + bubble_radius, row * row_spacing + bubble_radius)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    pub rows: u32,
    pub columns: u32,
    pub bubble_radius: u32,
    pub row_spacing: u32,
    pub col_spacing: u32,
}

impl GridSpec {
    /// Nominal centre of a cell, in region coordinates.
    pub fn cell_center(&self, row: u32, col: u32) -> (u32, u32) {
        (
            col.saturating_mul(self.col_spacing).saturating_add(self.bubble_radius),
            row.saturating_mul(self.row_spacing).saturating_add(self.bubble_radius),
        )
    }

    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.rows == 0 || self.columns == 0 {
            return Err(format!(
                "grid must have at least one row and column, found {}x{}",
                self.rows, self.columns
            ));
        }
        if self.bubble_radius == 0 {
            return Err("bubble_radius must be at least 1".into());
        }

        // Span from the first cell's left edge to the last cell's right edge.
        let span = |count: u32, spacing: u32| {
            (count - 1)
                .checked_mul(spacing)
                .and_then(|v| v.checked_add(self.bubble_radius.checked_mul(2)?))
                .filter(|&v| v <= MAX_TEMPLATE_EXTENT)
        };
        if span(self.columns, self.col_spacing).is_none() {
            return Err(format!(
                "{} columns at col_spacing {} with bubble_radius {} exceed {MAX_TEMPLATE_EXTENT} pixels",
                self.columns, self.col_spacing, self.bubble_radius
            ));
        }
        if span(self.rows, self.row_spacing).is_none() {
            return Err(format!(
                "{} rows at row_spacing {} with bubble_radius {} exceed {MAX_TEMPLATE_EXTENT} pixels",
                self.rows, self.row_spacing, self.bubble_radius
            ));
        }
        Ok(())
    }
}

/// One subject block of the answer region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub subject: String,
    #[serde(flatten)]
    pub region: RegionDescriptor,
    pub question_count: u32,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionParams {
    /// Minimum ink fraction for a bubble to count as marked.
    pub bubble_fill_threshold: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "templates": {
            "YKS_STANDARD": {
                "alignment_markers": {
                    "positions": [
                        {"x": 100, "y": 100}, {"x": 2400, "y": 100},
                        {"x": 2400, "y": 3400}, {"x": 100, "y": 3400}
                    ]
                },
                "regions": {
                    "student_number": {
                        "x": 105, "y": 237, "width": 400, "height": 800,
                        "grid": {"rows": 10, "columns": 8, "bubble_radius": 15,
                                 "row_spacing": 80, "col_spacing": 50}
                    },
                    "answers": {
                        "sections": [{
                            "subject": "turkish",
                            "x": 600, "y": 237, "width": 300, "height": 1600,
                            "question_count": 40,
                            "options": ["A", "B", "C", "D", "E"],
                            "grid": {"rows": 40, "columns": 5, "bubble_radius": 15,
                                     "row_spacing": 40, "col_spacing": 50}
                        }]
                    }
                },
                "detection_params": {"bubble_fill_threshold": 0.3}
            }
        }
    }"#;

    #[test]
    fn parses_sample_config() {
        let config = TemplateConfig::from_json_str(SAMPLE).expect("sample parses");
        let template = config.template("YKS_STANDARD").expect("template exists");
        assert_eq!(template.marker_positions().len(), 4);
        assert_eq!(template.student_number().grid.columns, 8);
        assert_eq!(template.sections()[0].subject, "turkish");
        assert_eq!(template.sections()[0].region.x, 600);
        assert!((template.fill_threshold() - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn unknown_template_is_reported() {
        let config = TemplateConfig::from_json_str(SAMPLE).unwrap();
        let err = config.template("LGS").unwrap_err();
        assert!(matches!(err, MarkwerkError::UnknownTemplate(name) if name == "LGS"));
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        let json = SAMPLE.replace("\"bubble_fill_threshold\": 0.3", "\"bubble_fill_threshold\": 1.5");
        let err = TemplateConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(err, MarkwerkError::InvalidTemplate(msg) if msg.contains("bubble_fill_threshold")));
    }

    #[test]
    fn rejects_question_count_mismatch() {
        let json = SAMPLE.replace("\"question_count\": 40", "\"question_count\": 35");
        let err = TemplateConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(err, MarkwerkError::InvalidTemplate(msg) if msg.contains("question_count")));
    }

    #[test]
    fn rejects_student_number_without_ten_rows() {
        let json = SAMPLE.replace(
            "\"grid\": {\"rows\": 10, \"columns\": 8",
            "\"grid\": {\"rows\": 9, \"columns\": 8",
        );
        let err = TemplateConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(err, MarkwerkError::InvalidTemplate(msg) if msg.contains("student_number")));
    }

    #[test]
    fn rejects_missing_marker() {
        let json = SAMPLE.replace(", {\"x\": 100, \"y\": 3400}", "");
        let err = TemplateConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(err, MarkwerkError::InvalidTemplate(msg) if msg.contains("alignment_markers")));
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = TemplateConfig::from_json_str("{\"templates\": ").unwrap_err();
        assert!(matches!(err, MarkwerkError::Serialization(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("omr_config.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = TemplateConfig::from_path(&path).unwrap();
        assert!(config.templates.contains_key("YKS_STANDARD"));
    }

    #[test]
    fn cell_center_follows_spacing() {
        let grid = GridSpec {
            rows: 10,
            columns: 8,
            bubble_radius: 15,
            row_spacing: 80,
            col_spacing: 50,
        };
        assert_eq!(grid.cell_center(0, 0), (15, 15));
        assert_eq!(grid.cell_center(1, 2), (115, 95));
        assert_eq!(grid.cell_count(), 80);
    }

    #[test]
    fn shipped_config_is_valid() {
        let config = TemplateConfig::from_json_str(include_str!("../../../config/omr_config.json")).unwrap();
        let template = config.template("YKS_STANDARD").unwrap();
        let subjects: Vec<&str> = template.sections().iter().map(|s| s.subject.as_str()).collect();
        assert_eq!(subjects, ["turkish", "social_sciences", "mathematics", "science"]);
    }

    #[test]
    fn rejects_oversized_grid_spacing() {
        let json = SAMPLE.replace("\"row_spacing\": 40", "\"row_spacing\": 4000000000");
        let err = TemplateConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(err, MarkwerkError::InvalidTemplate(msg) if msg.contains("row_spacing")));
    }

    #[test]
    fn rejects_oversized_region_origin() {
        let json = SAMPLE.replace("\"x\": 600", "\"x\": 4294967295");
        let err = TemplateConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(err, MarkwerkError::InvalidTemplate(msg) if msg.contains("sections[0].x")));
    }

    #[test]
    fn cell_center_saturates() {
        let grid = GridSpec {
            rows: 3,
            columns: 3,
            bubble_radius: u32::MAX,
            row_spacing: u32::MAX,
            col_spacing: 1,
        };
        assert_eq!(grid.cell_center(2, 2), (u32::MAX, u32::MAX));
    }
}
