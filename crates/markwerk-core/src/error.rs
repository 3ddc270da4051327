// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Markwerk.

use thiserror::Error;

/// Top-level error type for all Markwerk operations.
#[derive(Debug, Error)]
pub enum MarkwerkError {
    // -- Image errors --
    /// The input image could not be read or decoded. The payload carries the
    /// underlying reason for logging; the displayed message is fixed.
    #[error("Failed to load image")]
    ImageLoad(String),

    #[error("failed to save processed image: {0}")]
    ImageSave(String),

    #[error("geometry error: {0}")]
    Geometry(String),

    // -- Template / configuration errors --
    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    #[error("invalid scan configuration: {0}")]
    InvalidConfig(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MarkwerkError>;
