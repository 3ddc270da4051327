// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Markwerk — Core types, template configuration and error definitions shared
// across all crates.

pub mod config;
pub mod error;
pub mod template;
pub mod types;

pub use config::ScanConfig;
pub use error::{MarkwerkError, Result};
pub use template::{
    DetectionParams, GridSpec, MarkerPosition, RegionDescriptor, Section, Template,
    TemplateConfig,
};
pub use types::*;
