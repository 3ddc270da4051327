// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Field interpreters — turn bubble grids into a student number and
// per-subject answers, each with a confidence score.

use image::GrayImage;
use markwerk_core::{AnswerSheet, FieldRead, ScanConfig, Section, Template};
use tracing::{debug, info, instrument};

use crate::grid::{CellGrid, extract_roi, scan_grid};
use crate::trace::TraceSink;

/// Confidence of a student-number column with exactly one mark.
pub const DIGIT_SINGLE_CONFIDENCE: f64 = 1.0;
/// Confidence of an unmarked student-number column.
pub const DIGIT_BLANK_CONFIDENCE: f64 = 0.2;
/// Confidence of a student-number column with several marks.
pub const DIGIT_MULTIPLE_CONFIDENCE: f64 = 0.4;

/// Confidence of an answer row with exactly one mark.
pub const ANSWER_SINGLE_CONFIDENCE: f64 = 1.0;
/// Confidence of an unmarked answer row. A blank is a deliberate, valid
/// response.
pub const ANSWER_BLANK_CONFIDENCE: f64 = 0.8;
/// Confidence of an answer row with several marks.
pub const ANSWER_MULTIPLE_CONFIDENCE: f64 = 0.4;

/// Placeholder for a multi-marked digit (and, if enabled, answer).
pub const AMBIGUOUS: &str = "?";

/// How many bubbles of one field line were marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkVerdict {
    Blank,
    Single(u32),
    Multiple,
}

impl MarkVerdict {
    /// Classify the marked indices of one column or row.
    pub fn from_marked(marked: &[u32]) -> Self {
        match marked {
            [] => Self::Blank,
            [only] => Self::Single(*only),
            _ => Self::Multiple,
        }
    }
}

/// Student number with the cell grid it was read from.
#[derive(Debug, Clone)]
pub struct StudentNumberRead {
    pub field: FieldRead<String>,
    pub cells: CellGrid,
}

/// Answers with the cell grid of every section, in section order.
#[derive(Debug, Clone)]
pub struct AnswersRead {
    pub field: FieldRead<AnswerSheet>,
    pub sections: Vec<CellGrid>,
}

/// Interpret a student-number grid column by column.
///
/// Each column is one digit position and each row one digit value. A single
/// mark yields that digit, no mark contributes nothing, several marks yield
/// `"?"`. The confidence is the mean over columns.
pub fn interpret_student_number(cells: &CellGrid) -> FieldRead<String> {
    let mut number = String::new();
    let mut confidences = Vec::with_capacity(cells.columns() as usize);

    for col in 0..cells.columns() {
        match MarkVerdict::from_marked(&cells.marked_in_column(col)) {
            MarkVerdict::Single(digit) => {
                number.push_str(&digit.to_string());
                confidences.push(DIGIT_SINGLE_CONFIDENCE);
            }
            MarkVerdict::Blank => confidences.push(DIGIT_BLANK_CONFIDENCE),
            MarkVerdict::Multiple => {
                number.push_str(AMBIGUOUS);
                confidences.push(DIGIT_MULTIPLE_CONFIDENCE);
            }
        }
    }

    FieldRead {
        value: number,
        confidence: mean(&confidences),
    }
}

/// Interpret one answer section row by row, one read per question.
///
/// Blank and multi-marked rows both read as `""` unless `mark_ambiguous` is
/// set, in which case multi-marked rows read as `"?"`. The two cases always
/// differ in confidence.
pub fn interpret_section(cells: &CellGrid, section: &Section, mark_ambiguous: bool) -> Vec<FieldRead<String>> {
    let option_count = section.options.len() as u32;
    (0..section.question_count)
        .map(|row| {
            let marked: Vec<u32> = cells
                .marked_in_row(row)
                .into_iter()
                .filter(|&col| col < option_count)
                .collect();
            match MarkVerdict::from_marked(&marked) {
                MarkVerdict::Single(col) => FieldRead {
                    value: section.options[col as usize].clone(),
                    confidence: ANSWER_SINGLE_CONFIDENCE,
                },
                MarkVerdict::Blank => FieldRead {
                    value: String::new(),
                    confidence: ANSWER_BLANK_CONFIDENCE,
                },
                MarkVerdict::Multiple => FieldRead {
                    value: if mark_ambiguous { AMBIGUOUS.to_string() } else { String::new() },
                    confidence: ANSWER_MULTIPLE_CONFIDENCE,
                },
            }
        })
        .collect()
}

/// Read the student number from a rectified page.
#[instrument(skip_all)]
pub fn read_student_number(
    page: &GrayImage,
    template: &Template,
    config: &ScanConfig,
    trace: &dyn TraceSink,
) -> StudentNumberRead {
    let region = template.student_number();
    let roi = extract_roi(page, region);
    let scan = scan_grid(&roi, &region.grid, template.fill_threshold(), config.blur_sigma);
    trace.mask("student_number", &scan.mask);
    trace.fill_ratios("student_number", &scan.ratios);

    let field = interpret_student_number(&scan.cells);
    info!(number = %field.value, confidence = field.confidence, "Student number read");

    StudentNumberRead {
        field,
        cells: scan.cells,
    }
}

/// Read every answer section from a rectified page.
///
/// Sections are independent of each other; the overall confidence is the
/// mean over all questions of all sections.
#[instrument(skip_all, fields(sections = template.sections().len()))]
pub fn read_answers(
    page: &GrayImage,
    template: &Template,
    config: &ScanConfig,
    trace: &dyn TraceSink,
) -> AnswersRead {
    let mut sheet = AnswerSheet::new();
    let mut confidences = Vec::new();
    let mut grids = Vec::with_capacity(template.sections().len());

    for section in template.sections() {
        let roi = extract_roi(page, &section.region);
        let scan = scan_grid(&roi, &section.region.grid, template.fill_threshold(), config.blur_sigma);
        let stage = format!("answers_{}", section.subject);
        trace.mask(&stage, &scan.mask);
        trace.fill_ratios(&stage, &scan.ratios);

        let reads = interpret_section(&scan.cells, section, config.mark_ambiguous_answers);
        confidences.extend(reads.iter().map(|r| r.confidence));
        let answers: Vec<String> = reads.into_iter().map(|r| r.value).collect();
        debug!(subject = %section.subject, ?answers, "Section read");

        sheet.push(section.subject.clone(), answers);
        grids.push(scan.cells);
    }

    let confidence = mean(&confidences);
    info!(subjects = sheet.len(), confidence, "Answers read");

    AnswersRead {
        field: FieldRead {
            value: sheet,
            confidence,
        },
        sections: grids,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
