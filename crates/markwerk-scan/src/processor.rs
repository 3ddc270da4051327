// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Form processor — runs alignment, rectification and both field readers for
// one scanned sheet and assembles the result record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use markwerk_core::{FormResult, MarkwerkError, Result, ScanConfig, ScanReport, Template, TemplateConfig};
use tracing::{error, info, instrument, warn};

use crate::align::{Alignment, AlignmentLocator};
use crate::annotate::annotate;
use crate::fields::{AnswersRead, StudentNumberRead, read_answers, read_student_number};
use crate::rectify::rectify;
use crate::trace::{NoopTrace, TraceSink};

/// Everything read from one page, before any file is written.
#[derive(Debug, Clone)]
pub struct PageAnalysis {
    pub alignment: Option<Alignment>,
    /// The page in template space (or the raw scan if alignment failed).
    pub rectified: DynamicImage,
    pub student_number: StudentNumberRead,
    pub answers: AnswersRead,
}

impl PageAnalysis {
    pub fn alignment_found(&self) -> bool {
        self.alignment.is_some()
    }

    /// The image written to the output directory: the rectified page, with
    /// bubble verdicts drawn on it when `annotated` is set.
    pub fn processed_image(&self, template: &Template, annotated: bool) -> DynamicImage {
        if annotated {
            DynamicImage::ImageRgb8(annotate(
                &self.rectified,
                template,
                &self.student_number.cells,
                &self.answers.sections,
            ))
        } else {
            DynamicImage::ImageRgb8(self.rectified.to_rgb8())
        }
    }
}

/// Reads answer sheets against a set of templates.
///
/// Holds no per-call state: one processor can serve any number of sheets,
/// including from several threads at once.
pub struct FormProcessor {
    templates: TemplateConfig,
    config: ScanConfig,
    locator: AlignmentLocator,
    trace: Arc<dyn TraceSink>,
}

impl FormProcessor {
    // -- Construction ---------------------------------------------------------

    /// Create a processor with default scan tuning and no tracing.
    pub fn new(templates: TemplateConfig) -> Self {
        let config = ScanConfig::default();
        Self {
            locator: AlignmentLocator::from_config(&config),
            templates,
            config,
            trace: Arc::new(NoopTrace),
        }
    }

    /// Load templates from a JSON config file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_config_path(path: impl AsRef<Path>) -> Result<Self> {
        let templates = TemplateConfig::from_path(path)?;
        info!(templates = templates.templates.len(), "Template config loaded");
        Ok(Self::new(templates))
    }

    /// Replace the scan tuning.
    pub fn with_scan_config(mut self, config: ScanConfig) -> Result<Self> {
        config.validate()?;
        self.locator = AlignmentLocator::from_config(&config);
        self.config = config;
        Ok(self)
    }

    /// Route intermediate artefacts to a trace sink.
    pub fn with_trace(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    // -- Accessors ------------------------------------------------------------

    pub fn templates(&self) -> &TemplateConfig {
        &self.templates
    }

    pub fn scan_config(&self) -> &ScanConfig {
        &self.config
    }

    // -- Processing -----------------------------------------------------------

    /// Align, rectify and read one page in memory.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn analyze(&self, image: &DynamicImage, template: &Template) -> Result<PageAnalysis> {
        let trace = self.trace.as_ref();

        let alignment = self.locator.locate(image, trace);
        let rectified = rectify(image, alignment.as_ref())?.into_owned();

        let page = rectified.to_luma8();
        let student_number = read_student_number(&page, template, &self.config, trace);
        let answers = read_answers(&page, template, &self.config, trace);

        Ok(PageAnalysis {
            alignment,
            rectified,
            student_number,
            answers,
        })
    }

    /// Read one sheet from disk and write the processed image into
    /// `output_dir`.
    #[instrument(skip_all, fields(image_path = %image_path.as_ref().display(), template = template_name))]
    pub fn try_process_form(
        &self,
        image_path: impl AsRef<Path>,
        template_name: &str,
        output_dir: impl AsRef<Path>,
    ) -> Result<FormResult> {
        let image_path = image_path.as_ref();
        let image = image::open(image_path).map_err(|err| {
            warn!(path = %image_path.display(), error = %err, "Image could not be loaded");
            MarkwerkError::ImageLoad(err.to_string())
        })?;
        info!(width = image.width(), height = image.height(), "Scan loaded");

        let template = self.templates.template(template_name)?;
        let analysis = self.analyze(&image, template)?;

        let output_dir = output_dir.as_ref();
        std::fs::create_dir_all(output_dir)?;
        let output_path = self.output_path(image_path, output_dir);
        analysis
            .processed_image(template, self.config.annotate)
            .save(&output_path)
            .map_err(|err| MarkwerkError::ImageSave(format!("{}: {}", output_path.display(), err)))?;
        info!(path = %output_path.display(), "Processed image written");

        let alignment_found = analysis.alignment_found();
        Ok(FormResult::new(
            analysis.student_number.field,
            analysis.answers.field,
            output_path.display().to_string(),
            alignment_found,
        ))
    }

    /// Like [`try_process_form`](Self::try_process_form), but every error is
    /// folded into a `success: false` report.
    pub fn process_form(
        &self,
        image_path: impl AsRef<Path>,
        template_name: &str,
        output_dir: impl AsRef<Path>,
    ) -> ScanReport {
        match self.try_process_form(image_path, template_name, output_dir) {
            Ok(result) => ScanReport::Success(result),
            Err(err) => {
                error!(error = %err, "Form processing failed");
                ScanReport::failure(err)
            }
        }
    }

    /// `<output_dir>/<prefix><input stem>.jpg`
    fn output_path(&self, image_path: &Path, output_dir: &Path) -> PathBuf {
        let stem = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".into());
        output_dir.join(format!("{}{}.jpg", self.config.output_prefix, stem))
    }
}
