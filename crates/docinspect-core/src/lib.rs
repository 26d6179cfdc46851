// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docinspect — Core types, configuration records, and error definitions shared
// across all crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AnalysisConfig, ClassConfig, ClassSpec, FilterConfig, ModelConfig, PreprocessConfig};
pub use error::{DocInspectError, Result};
pub use types::*;
