// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Global binarization — Gaussian smoothing followed by an Otsu threshold,
// inverted so that ink becomes the white (255) foreground.

use image::GrayImage;
use image::imageops::{self, FilterType};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

/// Foreground value in binarized masks.
pub const INK: u8 = 255;

/// Largest image whose histogram sums `otsu_level` can take without
/// overflowing its `u32` accumulators.
const OTSU_MAX_PIXELS: u64 = (u32::MAX / 255) as u64;

/// Blur with the given sigma. Empty images are returned as-is.
pub fn smooth(gray: &GrayImage, sigma: f32) -> GrayImage {
    if gray.width() == 0 || gray.height() == 0 {
        return gray.clone();
    }
    gaussian_blur_f32(gray, sigma)
}

/// Threshold an already-smoothed image at its Otsu level, inverted.
///
/// Pixels at or below the level (the dark class) become [`INK`]; the rest
/// become 0. A uniform image has no dark class above level 0, so it yields an
/// empty mask unless it is entirely black.
pub fn binarize_inverted(gray: &GrayImage) -> GrayImage {
    let level = otsu_threshold(gray);
    debug!(level, "Otsu level computed");
    threshold(gray, level, ThresholdType::BinaryInverted)
}

/// Smooth then binarize, the preprocessing shared by marker search and grid
/// detection.
pub fn ink_mask(gray: &GrayImage, sigma: f32) -> GrayImage {
    binarize_inverted(&smooth(gray, sigma))
}

/// Otsu level of a grayscale image.
///
/// Very large scans are nearest-neighbour subsampled first; that keeps the
/// intensity distribution and so the level.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let (width, height) = gray.dimensions();
    let pixels = width as u64 * height as u64;
    if pixels <= OTSU_MAX_PIXELS {
        return otsu_level(gray);
    }

    let scale = (OTSU_MAX_PIXELS as f64 / pixels as f64).sqrt();
    let small_w = ((width as f64 * scale) as u32).max(1);
    let small_h = ((height as f64 * scale) as u32).max(1);
    debug!(width, height, small_w, small_h, "Subsampling for Otsu level");
    otsu_level(&imageops::resize(gray, small_w, small_h, FilterType::Nearest))
}

/// Count foreground pixels in a mask.
pub fn count_ink(mask: &GrayImage) -> u64 {
    mask.pixels().filter(|p| p.0[0] == INK).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn bimodal() -> GrayImage {
        GrayImage::from_fn(40, 20, |x, _| if x < 10 { Luma([30u8]) } else { Luma([220u8]) })
    }

    #[test]
    fn otsu_splits_bimodal_histogram() {
        let level = otsu_threshold(&bimodal());
        assert!((30..220).contains(&level), "level {level}");
    }

    #[test]
    fn dark_pixels_become_ink() {
        let mask = binarize_inverted(&bimodal());
        assert_eq!(mask.get_pixel(5, 5).0[0], INK);
        assert_eq!(mask.get_pixel(30, 5).0[0], 0);
        assert_eq!(count_ink(&mask), 10 * 20);
    }

    #[test]
    fn uniform_white_has_no_ink() {
        let white = GrayImage::from_pixel(32, 32, Luma([250u8]));
        assert_eq!(count_ink(&ink_mask(&white, 1.1)), 0);
    }

    #[test]
    fn empty_image_is_passed_through() {
        let empty = GrayImage::new(0, 0);
        assert_eq!(ink_mask(&empty, 1.1).dimensions(), (0, 0));
        assert_eq!(otsu_threshold(&empty), 0);
    }

    #[test]
    fn oversized_scan_still_gets_a_level() {
        // 17M pixels, past the direct histogram limit.
        let big = GrayImage::from_fn(4100, 4150, |x, _| if x < 1000 { Luma([20u8]) } else { Luma([235u8]) });
        let level = otsu_threshold(&big);
        assert!((20..235).contains(&level), "level {level}");
    }
}
