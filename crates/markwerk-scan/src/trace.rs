// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Observability hook for the recognition pipeline.
//
// The pipeline itself is a pure function of image and template. Intermediate
// artefacts (binarized masks, alignment outcome, raw fill ratios) are handed
// to an injected `TraceSink` instead of being written as side effects.

use std::path::{Path, PathBuf};

use image::GrayImage;
use markwerk_core::{AlignmentMethod, Quad};
use tracing::{debug, warn};

use crate::grid::FillGrid;

/// Receives intermediate pipeline artefacts. Every method defaults to a no-op.
pub trait TraceSink: Send + Sync {
    /// Outcome of alignment: the method and ordered corners, or `None`.
    fn alignment(&self, _found: Option<(AlignmentMethod, &Quad)>) {}

    /// A binarized mask produced by `stage` (e.g. `alignment`,
    /// `student_number`, `answers_mathematics`).
    fn mask(&self, _stage: &str, _mask: &GrayImage) {}

    /// Raw per-cell fill ratios measured for a field (`None` where the
    /// sampling window fell outside the region).
    fn fill_ratios(&self, _field: &str, _ratios: &FillGrid) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTrace;

impl TraceSink for NoopTrace {}

/// Writes each mask as `<stage>.png` and each fill-ratio grid as
/// `<field>.json` into a debug directory.
#[derive(Debug, Clone)]
pub struct DirectoryTrace {
    dir: PathBuf,
}

impl DirectoryTrace {
    /// Create the sink, creating `dir` if needed.
    pub fn new(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, stage: &str, extension: &str) -> PathBuf {
        let safe: String = stage
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.{extension}"))
    }
}

impl TraceSink for DirectoryTrace {
    fn alignment(&self, found: Option<(AlignmentMethod, &Quad)>) {
        match found {
            Some((method, corners)) => debug!(?method, ?corners, "Trace: alignment"),
            None => debug!("Trace: alignment not found"),
        }
    }

    fn mask(&self, stage: &str, mask: &GrayImage) {
        let path = self.file_for(stage, "png");
        if let Err(err) = mask.save(&path) {
            warn!(path = %path.display(), error = %err, "Failed to write trace mask");
        }
    }

    fn fill_ratios(&self, field: &str, ratios: &FillGrid) {
        let path = self.file_for(field, "json");
        let rows: Vec<Vec<Option<f32>>> = (0..ratios.rows())
            .map(|row| (0..ratios.columns()).map(|col| ratios.get(row, col)).collect())
            .collect();
        let written = serde_json::to_vec_pretty(&rows)
            .map_err(std::io::Error::other)
            .and_then(|bytes| std::fs::write(&path, bytes));
        if let Err(err) = written {
            warn!(path = %path.display(), error = %err, "Failed to write trace fill ratios");
        }
    }
}
