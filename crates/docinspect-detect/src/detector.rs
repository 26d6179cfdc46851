// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detector capability and construction-time variant selection.

use std::path::Path;
use std::sync::Arc;

use docinspect_core::{AnalysisConfig, ClassConfig, Page, RawCandidate, Result};
use tracing::{info, warn};

use crate::synthetic::SyntheticDetector;

/// How callers may share a detector's inference context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceConcurrency {
    /// Any number of pages may run inference at once.
    Shared,
    /// One inference at a time (e.g. a single GPU context).
    Exclusive,
}

/// Produces raw, unthresholded candidates for one page.
///
/// Implementations are read-only after construction and shared across page
/// workers behind an `Arc`.
pub trait Detector: Send + Sync {
    /// Short identifier recorded in analysis results.
    fn name(&self) -> &'static str;

    fn concurrency(&self) -> InferenceConcurrency {
        InferenceConcurrency::Shared
    }

    fn detect(&self, page: &Page) -> Result<Vec<RawCandidate>>;
}

/// Pick the detector for `config`.
///
/// A configured model is loaded once here. When no model is configured, or the
/// weights cannot be loaded, the synthetic detector takes over so the analysis
/// still runs.
pub fn build_detector(config: &AnalysisConfig, classes: Arc<ClassConfig>) -> Arc<dyn Detector> {
    let Some(path) = config.model_path.as_deref() else {
        info!(seed = config.seed, "No model configured; using synthetic detector");
        return Arc::new(SyntheticDetector::new(config.seed));
    };

    match load_model(path, config, classes) {
        Ok(detector) => detector,
        Err(err) => {
            warn!(error = %err, "Model unavailable; falling back to synthetic detector");
            Arc::new(SyntheticDetector::new(config.seed))
        }
    }
}

#[cfg(feature = "model")]
fn load_model(
    path: &Path,
    config: &AnalysisConfig,
    classes: Arc<ClassConfig>,
) -> Result<Arc<dyn Detector>> {
    let detector = crate::model::ModelDetector::load(
        path,
        config.use_gpu,
        docinspect_core::ModelConfig::default(),
        config.confidence_threshold,
        classes,
    )?;
    Ok(Arc::new(detector))
}

#[cfg(not(feature = "model"))]
fn load_model(
    path: &Path,
    _config: &AnalysisConfig,
    _classes: Arc<ClassConfig>,
) -> Result<Arc<dyn Detector>> {
    Err(docinspect_core::DocInspectError::ModelLoad(format!(
        "{}: built without the `model` feature",
        path.display()
    )))
}
