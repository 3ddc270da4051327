// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// markwerk — reads one scanned answer sheet and prints the result as a
// single JSON object on stdout. Logs go to stderr.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use markwerk_core::{Result, ScanConfig, ScanReport};
use markwerk_scan::{DirectoryTrace, FormProcessor};

#[derive(Parser, Debug)]
#[command(name = "markwerk")]
#[command(about = "Read student number and answers from a scanned bubble answer sheet")]
#[command(version)]
struct Cli {
    /// Scanned sheet (any format the image decoder understands).
    image: PathBuf,

    /// Template name within the config file.
    template: String,

    /// Template config (JSON).
    config: PathBuf,

    /// Directory for the processed image; created if missing.
    output_dir: PathBuf,

    /// Scan tuning overrides (JSON). Missing fields keep their defaults.
    #[arg(long)]
    scan_config: Option<PathBuf>,

    /// Write intermediate masks and fill ratios into this directory.
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    /// Write the plain rectified image instead of the annotated one.
    #[arg(long)]
    no_annotate: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let report = match build_processor(&cli) {
        Ok(processor) => run_guarded(&processor, &cli),
        Err(err) => {
            tracing::error!(error = %err, "Setup failed");
            ScanReport::failure(err)
        }
    };

    emit(&report)
}

fn build_processor(cli: &Cli) -> Result<FormProcessor> {
    let mut config = match &cli.scan_config {
        Some(path) => ScanConfig::from_path(path)?,
        None => ScanConfig::default(),
    };
    if cli.no_annotate {
        config.annotate = false;
    }

    let mut processor = FormProcessor::from_config_path(&cli.config)?.with_scan_config(config)?;
    if let Some(dir) = &cli.debug_dir {
        processor = processor.with_trace(Arc::new(DirectoryTrace::new(dir)?));
        tracing::info!(dir = %dir.display(), "Debug trace enabled");
    }
    Ok(processor)
}

/// Process the sheet, turning a panic anywhere in the pipeline into a
/// failure report.
fn run_guarded(processor: &FormProcessor, cli: &Cli) -> ScanReport {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        processor.process_form(&cli.image, &cli.template, &cli.output_dir)
    }));
    outcome.unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".into());
        tracing::error!(%message, "Processing panicked");
        ScanReport::failure(format!("Internal error: {message}"))
    })
}

fn emit(report: &ScanReport) -> ExitCode {
    match serde_json::to_string(report) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            println!(r#"{{"success":false,"error":"Failed to serialize result"}}"#);
            tracing::error!(error = %err, "Result serialization failed");
            return ExitCode::FAILURE;
        }
    }

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::path::Path;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn four_positionals_are_required() {
        assert!(Cli::try_parse_from(["markwerk", "scan.jpg", "YKS_STANDARD", "omr_config.json"]).is_err());

        let cli = Cli::try_parse_from([
            "markwerk",
            "scan.jpg",
            "YKS_STANDARD",
            "omr_config.json",
            "out",
            "--no-annotate",
            "--debug-dir",
            "dbg",
        ])
        .unwrap();
        assert_eq!(cli.template, "YKS_STANDARD");
        assert_eq!(cli.output_dir, PathBuf::from("out"));
        assert!(cli.no_annotate);
        assert_eq!(cli.debug_dir, Some(PathBuf::from("dbg")));
        assert!(cli.scan_config.is_none());
    }

    fn path_arg(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn missing_config_file_fails_setup() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "markwerk".to_string(),
            path_arg(&dir.path().join("scan.jpg")),
            "YKS_STANDARD".to_string(),
            path_arg(&dir.path().join("nope.json")),
            path_arg(&dir.path().join("out")),
        ])
        .unwrap();
        assert!(build_processor(&cli).is_err());
    }

    #[test]
    fn no_annotate_overrides_scan_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("omr_config.json");
        std::fs::write(&config, SAMPLE_CONFIG).unwrap();
        let tuning = dir.path().join("scan.json");
        std::fs::write(&tuning, r#"{"annotate": true, "output_prefix": "read_"}"#).unwrap();

        let cli = Cli::try_parse_from([
            "markwerk".to_string(),
            path_arg(&dir.path().join("scan.jpg")),
            "T".to_string(),
            path_arg(&config),
            path_arg(dir.path()),
            "--scan-config".to_string(),
            path_arg(&tuning),
            "--no-annotate".to_string(),
        ])
        .unwrap();
        let processor = build_processor(&cli).unwrap();
        assert!(!processor.scan_config().annotate);
        assert_eq!(processor.scan_config().output_prefix, "read_");
    }

    const SAMPLE_CONFIG: &str = r#"{"templates": {"T": {
            "alignment_markers": {"positions": [{"x":10,"y":10},{"x":90,"y":10},{"x":90,"y":90},{"x":10,"y":90}]},
            "regions": {
                "student_number": {"x":0,"y":0,"width":40,"height":60,
                    "grid":{"rows":10,"columns":2,"bubble_radius":2,"row_spacing":5,"col_spacing":5}},
                "answers": {"sections": [{"subject":"s","x":50,"y":0,"width":30,"height":30,
                    "question_count":2,"options":["A","B"],
                    "grid":{"rows":2,"columns":2,"bubble_radius":2,"row_spacing":5,"col_spacing":5}}]}
            },
            "detection_params": {"bubble_fill_threshold": 0.3}
        }}}"#;
}
