// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Verdict overlay for the processed image: one circle per bubble, green when
// marked and red when not.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_circle_mut;
use markwerk_core::{RegionDescriptor, Template};

use crate::grid::CellGrid;

const MARKED: Rgb<u8> = Rgb([0, 200, 0]);
const UNMARKED: Rgb<u8> = Rgb([220, 0, 0]);

/// Draw the bubble verdicts of every field onto an RGB copy of the page.
pub fn annotate(page: &DynamicImage, template: &Template, student: &CellGrid, sections: &[CellGrid]) -> RgbImage {
    let mut canvas = page.to_rgb8();
    draw_region(&mut canvas, template.student_number(), student, 2);
    for (section, cells) in template.sections().iter().zip(sections) {
        draw_region(&mut canvas, &section.region, cells, 1);
    }
    canvas
}

fn draw_region(canvas: &mut RgbImage, region: &RegionDescriptor, cells: &CellGrid, thickness: u32) {
    let grid = &region.grid;
    let (width, height) = canvas.dimensions();
    let bubble_radius = grid.bubble_radius.min(width.max(height));
    for row in 0..cells.rows().min(grid.rows) {
        for col in 0..cells.columns().min(grid.columns) {
            let (cx, cy) = grid.cell_center(row, col);
            let x = region.x.saturating_add(cx);
            let y = region.y.saturating_add(cy);
            // Circle lies entirely off-canvas.
            if x >= width.saturating_add(bubble_radius) || y >= height.saturating_add(bubble_radius) {
                continue;
            }
            let center = (x as i32, y as i32);
            let color = if cells.is_marked(row, col) { MARKED } else { UNMARKED };
            for inset in 0..thickness {
                let radius = bubble_radius as i32 - inset as i32;
                if radius > 0 {
                    draw_hollow_circle_mut(canvas, center, radius, color);
                }
            }
        }
    }
}
