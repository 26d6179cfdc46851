// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docinspect-pipeline — The `analyze(document) -> result` entry point.
//
// Rasterizes a document, fans its pages out over a bounded worker pool
// (preprocess, detect, filter, annotate), and folds the per-page outcomes into
// one immutable result and its JSON report.

pub mod aggregate;
pub mod analyzer;
pub mod cancel;
pub mod report;

pub use aggregate::{PageOutcome, ResultHeader, aggregate};
pub use analyzer::{Analyzer, AnalyzerBuilder};
pub use cancel::CancelHandle;
pub use report::AnalysisReport;
