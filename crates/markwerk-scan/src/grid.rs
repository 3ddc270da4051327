// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grid mark detection — binarize a region and measure, per bubble, the share
// of ink pixels inside the bubble's square sampling window.

use image::GrayImage;
use image::imageops;
use markwerk_core::{GridSpec, RegionDescriptor};
use tracing::{debug, instrument, warn};

use crate::threshold::{INK, ink_mask};

/// Per-cell fill ratios in row-major order. `None` marks a sampling window
/// that was clipped away entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct FillGrid {
    rows: u32,
    columns: u32,
    ratios: Vec<Option<f32>>,
}

impl FillGrid {
    pub fn new(rows: u32, columns: u32, ratios: Vec<Option<f32>>) -> Self {
        assert_eq!(ratios.len(), rows as usize * columns as usize, "ratio count must match grid");
        Self { rows, columns, ratios }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn get(&self, row: u32, col: u32) -> Option<f32> {
        self.ratios[(row * self.columns + col) as usize]
    }

    /// Apply the fill threshold cell by cell.
    pub fn to_cells(&self, threshold: f32) -> CellGrid {
        let cells = self
            .ratios
            .iter()
            .map(|ratio| ratio.is_some_and(|r| r >= threshold))
            .collect();
        CellGrid {
            rows: self.rows,
            columns: self.columns,
            cells,
        }
    }
}

/// Boolean bubble matrix; `true` means the fill ratio reached the threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellGrid {
    rows: u32,
    columns: u32,
    cells: Vec<bool>,
}

impl CellGrid {
    /// Build from explicit rows. All rows must have the same length.
    pub fn from_rows(rows: &[Vec<bool>]) -> Self {
        let columns = rows.first().map_or(0, Vec::len);
        assert!(rows.iter().all(|row| row.len() == columns), "ragged cell rows");
        Self {
            rows: rows.len() as u32,
            columns: columns as u32,
            cells: rows.iter().flatten().copied().collect(),
        }
    }

    /// A grid with every cell unmarked.
    pub fn empty(rows: u32, columns: u32) -> Self {
        Self {
            rows,
            columns,
            cells: vec![false; rows as usize * columns as usize],
        }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn is_marked(&self, row: u32, col: u32) -> bool {
        self.cells[(row * self.columns + col) as usize]
    }

    /// Indices of marked rows within one column.
    pub fn marked_in_column(&self, col: u32) -> Vec<u32> {
        (0..self.rows).filter(|&row| self.is_marked(row, col)).collect()
    }

    /// Indices of marked columns within one row.
    pub fn marked_in_row(&self, row: u32) -> Vec<u32> {
        (0..self.columns).filter(|&col| self.is_marked(row, col)).collect()
    }

    pub fn marked_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

/// Everything a grid pass produced.
#[derive(Debug, Clone)]
pub struct GridScan {
    pub mask: GrayImage,
    pub ratios: FillGrid,
    pub cells: CellGrid,
}

/// Crop a region from the page, clipped to the page bounds. A region that
/// lies entirely outside the page yields an empty image.
pub fn extract_roi(page: &GrayImage, region: &RegionDescriptor) -> GrayImage {
    let (page_w, page_h) = page.dimensions();
    let x = region.x.min(page_w);
    let y = region.y.min(page_h);
    let width = region.width.min(page_w - x);
    let height = region.height.min(page_h - y);
    imageops::crop_imm(page, x, y, width, height).to_image()
}

/// Measure ink fill ratios of every cell on a binarized mask.
///
/// The sampling window of a cell is the square `[c - r, c + r)` around its
/// nominal centre on both axes, clipped to the mask. Cells never look at each
/// other.
pub fn measure_fill_ratios(mask: &GrayImage, grid: &GridSpec) -> FillGrid {
    let (mask_w, mask_h) = mask.dimensions();
    let radius = grid.bubble_radius;
    let mut ratios = Vec::with_capacity(grid.cell_count());

    for row in 0..grid.rows {
        for col in 0..grid.columns {
            let (cx, cy) = grid.cell_center(row, col);
            let x1 = cx.saturating_sub(radius);
            let y1 = cy.saturating_sub(radius);
            let x2 = cx.saturating_add(radius).min(mask_w);
            let y2 = cy.saturating_add(radius).min(mask_h);

            if x2 <= x1 || y2 <= y1 {
                ratios.push(None);
                continue;
            }

            let mut filled = 0u32;
            for y in y1..y2 {
                for x in x1..x2 {
                    if mask.get_pixel(x, y).0[0] == INK {
                        filled += 1;
                    }
                }
            }
            let total = (x2 - x1) * (y2 - y1);
            ratios.push(Some(filled as f32 / total as f32));
        }
    }

    FillGrid::new(grid.rows, grid.columns, ratios)
}

/// Binarize a region and classify every bubble of its grid.
#[instrument(skip(roi), fields(roi_w = roi.width(), roi_h = roi.height(), rows = grid.rows, columns = grid.columns))]
pub fn scan_grid(roi: &GrayImage, grid: &GridSpec, threshold: f32, blur_sigma: f32) -> GridScan {
    if roi.width() == 0 || roi.height() == 0 {
        warn!("Empty region of interest; every bubble reads as unmarked");
        return GridScan {
            mask: roi.clone(),
            ratios: FillGrid::new(grid.rows, grid.columns, vec![None; grid.cell_count()]),
            cells: CellGrid::empty(grid.rows, grid.columns),
        };
    }

    let mask = ink_mask(roi, blur_sigma);
    let ratios = measure_fill_ratios(&mask, grid);
    let cells = ratios.to_cells(threshold);
    debug!(marked = cells.marked_count(), "Grid scanned");

    GridScan { mask, ratios, cells }
}

/// Classify every bubble of a grid: `true` iff its fill ratio reaches
/// `threshold`.
pub fn detect_bubbles_in_grid(
    roi: &GrayImage,
    grid: &GridSpec,
    threshold: f32,
    blur_sigma: f32,
) -> CellGrid {
    scan_grid(roi, grid, threshold, blur_sigma).cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};

    const GRID: GridSpec = GridSpec {
        rows: 3,
        columns: 5,
        bubble_radius: 10,
        row_spacing: 30,
        col_spacing: 30,
    };

    /// White ROI with every bubble outlined in light grey and only `filled`
    /// filled in.
    fn roi_with(filled: &[(u32, u32)]) -> GrayImage {
        let mut img = GrayImage::from_pixel(150, 90, Luma([245u8]));
        for row in 0..GRID.rows {
            for col in 0..GRID.columns {
                let (cx, cy) = GRID.cell_center(row, col);
                draw_hollow_circle_mut(&mut img, (cx as i32, cy as i32), 10, Luma([170u8]));
                if filled.contains(&(row, col)) {
                    draw_filled_circle_mut(&mut img, (cx as i32, cy as i32), 8, Luma([15u8]));
                }
            }
        }
        img
    }

    #[test]
    fn single_filled_bubble_marks_exactly_one_cell() {
        let cells = detect_bubbles_in_grid(&roi_with(&[(1, 3)]), &GRID, 0.35, 1.1);
        assert_eq!(cells.marked_count(), 1);
        assert!(cells.is_marked(1, 3));
        assert_eq!(cells.marked_in_row(1), vec![3]);
        assert_eq!(cells.marked_in_column(3), vec![1]);
    }

    #[test]
    fn filled_and_empty_ratios_are_separated() {
        let scan = scan_grid(&roi_with(&[(0, 0)]), &GRID, 0.35, 1.1);
        let filled = scan.ratios.get(0, 0).unwrap();
        let empty = scan.ratios.get(2, 4).unwrap();
        assert!(filled > 0.4, "filled ratio {filled}");
        assert!(empty < 0.2, "empty ratio {empty}");
    }

    #[test]
    fn blank_roi_marks_nothing() {
        let blank = GrayImage::from_pixel(150, 90, Luma([250u8]));
        let cells = detect_bubbles_in_grid(&blank, &GRID, 0.35, 1.1);
        assert_eq!(cells.marked_count(), 0);
    }

    #[test]
    fn windows_outside_the_roi_are_unmarked() {
        // Only the first two columns fit.
        let mut small = GrayImage::from_pixel(60, 90, Luma([250u8]));
        for y in 0..90 {
            for x in 0..60 {
                if (x + y) % 2 == 0 {
                    small.put_pixel(x, y, Luma([0u8]));
                }
            }
        }
        let scan = scan_grid(&small, &GRID, 0.0, 1.1);
        assert!(scan.ratios.get(0, 4).is_none());
        assert!(!scan.cells.is_marked(0, 4));
        assert!(scan.ratios.get(0, 1).is_some());
    }

    #[test]
    fn empty_roi_yields_unmarked_grid() {
        let cells = detect_bubbles_in_grid(&GrayImage::new(0, 0), &GRID, 0.0, 1.1);
        assert_eq!((cells.rows(), cells.columns()), (3, 5));
        assert_eq!(cells.marked_count(), 0);
    }

    #[test]
    fn extract_roi_clips_to_page() {
        let page = GrayImage::new(100, 80);
        let region = RegionDescriptor {
            x: 70,
            y: 60,
            width: 50,
            height: 50,
            grid: GRID,
        };
        assert_eq!(extract_roi(&page, &region).dimensions(), (30, 20));

        let outside = RegionDescriptor { x: 200, ..region };
        assert_eq!(extract_roi(&page, &outside).dimensions(), (0, 20));
    }

    #[test]
    fn cell_grid_from_rows() {
        let grid = CellGrid::from_rows(&[vec![true, false], vec![true, true]]);
        assert_eq!(grid.marked_in_column(0), vec![0, 1]);
        assert_eq!(grid.marked_in_row(1), vec![0, 1]);
        assert_eq!(grid.marked_count(), 3);
    }

    #[test]
    fn huge_spacing_reads_as_clipped_not_overflow() {
        let grid = GridSpec {
            rows: 2,
            columns: 2,
            bubble_radius: 10,
            row_spacing: u32::MAX / 2,
            col_spacing: u32::MAX / 2,
        };
        let ratios = measure_fill_ratios(&GrayImage::new(40, 40), &grid);
        assert!(ratios.get(0, 0).is_some());
        assert!(ratios.get(1, 1).is_none());
    }
}
