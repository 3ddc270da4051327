// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Markwerk: alignment geometry and the result record.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Four image points, `[top_left, top_right, bottom_right, bottom_left]` once
/// ordered.
pub type Quad = [(f32, f32); 4];

/// Which alignment strategy produced the rectification quadrilateral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMethod {
    /// Four (or more) fiducial marker blobs.
    Markers,
    /// The form's own outer border.
    Border,
}

/// An interpreted field value together with its read confidence in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRead<T> {
    pub value: T,
    pub confidence: f64,
}

/// Per-subject answers in template-declared section order.
///
/// Serialises as a JSON object `{ subject: [answer, ...] }` whose keys keep
/// the section order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerSheet {
    subjects: Vec<(String, Vec<String>)>,
}

impl AnswerSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subject: impl Into<String>, answers: Vec<String>) {
        self.subjects.push((subject.into(), answers));
    }

    /// Answers for a subject, one entry per question.
    pub fn get(&self, subject: &str) -> Option<&[String]> {
        self.subjects
            .iter()
            .find(|(name, _)| name == subject)
            .map(|(_, answers)| answers.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.subjects
            .iter()
            .map(|(name, answers)| (name.as_str(), answers.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

impl Serialize for AnswerSheet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.subjects.len()))?;
        for (subject, answers) in &self.subjects {
            map.serialize_entry(subject, answers)?;
        }
        map.end()
    }
}

/// Successful read of one answer sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormResult {
    pub success: bool,
    pub student_number_detected: String,
    pub answers: AnswerSheet,
    pub confidence_score: f64,
    pub student_number_confidence: f64,
    pub answers_confidence: f64,
    pub image_path: String,
    pub alignment_found: bool,
}

impl FormResult {
    /// Assemble the record from the two field reads. The overall confidence
    /// is the unweighted mean of both; all three scores are rounded to three
    /// decimal places.
    pub fn new(
        student_number: FieldRead<String>,
        answers: FieldRead<AnswerSheet>,
        image_path: String,
        alignment_found: bool,
    ) -> Self {
        let overall = (student_number.confidence + answers.confidence) / 2.0;
        Self {
            success: true,
            student_number_detected: student_number.value,
            answers: answers.value,
            confidence_score: round3(overall),
            student_number_confidence: round3(student_number.confidence),
            answers_confidence: round3(answers.confidence),
            image_path,
            alignment_found,
        }
    }
}

/// Outcome of a `process_form` call as emitted on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScanReport {
    Success(FormResult),
    Failure { success: bool, error: String },
}

impl ScanReport {
    pub fn failure(error: impl ToString) -> Self {
        Self::Failure {
            success: false,
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn as_result(&self) -> Option<&FormResult> {
        match self {
            Self::Success(result) => Some(result),
            Self::Failure { .. } => None,
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_sheet_keeps_section_order() {
        let mut sheet = AnswerSheet::new();
        sheet.push("turkish", vec!["A".into(), "".into()]);
        sheet.push("mathematics", vec!["C".into()]);
        sheet.push("science", vec![]);
        let json = serde_json::to_string(&sheet).unwrap();
        assert_eq!(
            json,
            r#"{"turkish":["A",""],"mathematics":["C"],"science":[]}"#
        );
        assert_eq!(sheet.get("mathematics"), Some(&["C".to_string()][..]));
        assert!(sheet.get("history").is_none());
    }

    #[test]
    fn form_result_rounds_and_averages() {
        let result = FormResult::new(
            FieldRead {
                value: "1234".into(),
                confidence: 0.8,
            },
            FieldRead {
                value: AnswerSheet::new(),
                confidence: 2.0 / 3.0,
            },
            "out/processed_scan.jpg".into(),
            true,
        );
        assert!(result.success);
        assert_eq!(result.answers_confidence, 0.667);
        assert_eq!(result.confidence_score, 0.733);
    }

    #[test]
    fn failure_serialises_flat() {
        let report = ScanReport::failure("Failed to load image");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "error": "Failed to load image"})
        );
        assert!(!report.is_success());
    }

    #[test]
    fn success_serialises_record_keys() {
        let report = ScanReport::Success(FormResult::new(
            FieldRead {
                value: "42".into(),
                confidence: 1.0,
            },
            FieldRead {
                value: AnswerSheet::new(),
                confidence: 1.0,
            },
            "p.jpg".into(),
            false,
        ));
        let json = serde_json::to_value(&report).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        for key in [
            "success",
            "student_number_detected",
            "answers",
            "confidence_score",
            "student_number_confidence",
            "answers_confidence",
            "image_path",
            "alignment_found",
        ] {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert_eq!(json["alignment_found"], false);
    }
}
