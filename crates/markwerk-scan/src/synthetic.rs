// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic answer sheets for tests and benchmarks.
//
// Sheets are drawn in scan space: alignment markers are centred on the
// template's marker positions and every region is offset by the first
// (top-left) marker, which is where rectification puts the template origin.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use markwerk_core::{RegionDescriptor, Result, Template, TemplateConfig};

const PAPER: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);
const OUTLINE: Rgb<u8> = Rgb([180, 180, 180]);

/// Name of the template in [`COMPACT_CONFIG`].
pub const COMPACT_TEMPLATE: &str = "COMPACT";

/// A small two-subject layout (700x900 sheet) that keeps image tests fast.
pub const COMPACT_CONFIG: &str = r#"{
    "templates": {
        "COMPACT": {
            "alignment_markers": {
                "positions": [
                    {"x": 40, "y": 40}, {"x": 660, "y": 40},
                    {"x": 660, "y": 860}, {"x": 40, "y": 860}
                ]
            },
            "regions": {
                "student_number": {
                    "x": 20, "y": 20, "width": 230, "height": 290,
                    "grid": {"rows": 10, "columns": 8, "bubble_radius": 10,
                             "row_spacing": 28, "col_spacing": 28}
                },
                "answers": {
                    "sections": [
                        {
                            "subject": "mathematics",
                            "x": 300, "y": 20, "width": 150, "height": 290,
                            "question_count": 10,
                            "options": ["A", "B", "C", "D", "E"],
                            "grid": {"rows": 10, "columns": 5, "bubble_radius": 10,
                                     "row_spacing": 28, "col_spacing": 28}
                        },
                        {
                            "subject": "science",
                            "x": 300, "y": 340, "width": 150, "height": 290,
                            "question_count": 10,
                            "options": ["A", "B", "C", "D", "E"],
                            "grid": {"rows": 10, "columns": 5, "bubble_radius": 10,
                                     "row_spacing": 28, "col_spacing": 28}
                        }
                    ]
                }
            },
            "detection_params": {"bubble_fill_threshold": 0.35}
        }
    }
}"#;

/// Parse [`COMPACT_CONFIG`].
pub fn compact_config() -> Result<TemplateConfig> {
    TemplateConfig::from_json_str(COMPACT_CONFIG)
}

/// Renders filled-in sheets for one template.
#[derive(Debug, Clone)]
pub struct SyntheticSheet<'a> {
    template: &'a Template,
    marker_half: u32,
    markers: bool,
    border: bool,
}

impl<'a> SyntheticSheet<'a> {
    pub fn new(template: &'a Template) -> Self {
        Self {
            template,
            marker_half: 15,
            markers: true,
            border: true,
        }
    }

    /// Half the side of each square marker (the side is `2 * half + 1`).
    pub fn marker_half(mut self, half: u32) -> Self {
        self.marker_half = half;
        self
    }

    pub fn markers(mut self, enabled: bool) -> Self {
        self.markers = enabled;
        self
    }

    pub fn border(mut self, enabled: bool) -> Self {
        self.border = enabled;
        self
    }

    /// Sheet size: the marker span plus the same margin on both sides.
    pub fn size(&self) -> (u32, u32) {
        let positions = self.template.marker_positions();
        let min_x = positions.iter().map(|p| p.x).min().unwrap_or(0);
        let max_x = positions.iter().map(|p| p.x).max().unwrap_or(0);
        let min_y = positions.iter().map(|p| p.y).min().unwrap_or(0);
        let max_y = positions.iter().map(|p| p.y).max().unwrap_or(0);
        (max_x + min_x, max_y + min_y)
    }

    /// Draw a sheet.
    ///
    /// `student_number` fills one bubble per digit character, column by
    /// column; other characters leave their column blank. `answer` returns
    /// the option indices to fill for `(section_index, question)`.
    pub fn render(&self, student_number: &str, answer: impl Fn(usize, u32) -> Vec<u32>) -> RgbImage {
        let (width, height) = self.size();
        let mut sheet = RgbImage::from_pixel(width, height, PAPER);

        if self.border && width > 24 && height > 24 {
            for inset in [10, 11] {
                draw_hollow_rect_mut(
                    &mut sheet,
                    Rect::at(inset, inset).of_size(width - 2 * inset as u32, height - 2 * inset as u32),
                    INK,
                );
            }
        }

        if self.markers {
            let side = 2 * self.marker_half + 1;
            for p in self.template.marker_positions() {
                let corner = (p.x as i32 - self.marker_half as i32, p.y as i32 - self.marker_half as i32);
                draw_filled_rect_mut(&mut sheet, Rect::at(corner.0, corner.1).of_size(side, side), INK);
            }
        }

        let origin = self
            .template
            .marker_positions()
            .first()
            .map_or((0, 0), |p| (p.x, p.y));

        let digits: Vec<Option<u32>> = student_number.chars().map(|c| c.to_digit(10)).collect();
        draw_grid(&mut sheet, self.template.student_number(), origin, |row, col| {
            digits.get(col as usize).copied().flatten() == Some(row)
        });

        for (index, section) in self.template.sections().iter().enumerate() {
            let chosen: Vec<Vec<u32>> = (0..section.question_count).map(|q| answer(index, q)).collect();
            draw_grid(&mut sheet, &section.region, origin, |row, col| {
                chosen.get(row as usize).is_some_and(|marks| marks.contains(&col))
            });
        }

        sheet
    }
}

fn draw_grid(sheet: &mut RgbImage, region: &RegionDescriptor, origin: (u32, u32), filled: impl Fn(u32, u32) -> bool) {
    let grid = &region.grid;
    let radius = grid.bubble_radius as i32;
    for row in 0..grid.rows {
        for col in 0..grid.columns {
            let (cx, cy) = grid.cell_center(row, col);
            let center = (
                (origin.0 + region.x + cx) as i32,
                (origin.1 + region.y + cy) as i32,
            );
            draw_hollow_circle_mut(sheet, center, radius, OUTLINE);
            if filled(row, col) && radius > 2 {
                draw_filled_circle_mut(sheet, center, radius - 2, INK);
            }
        }
    }
}
