// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Aggregation — folds per-page outcomes into the final analysis result.

use std::path::PathBuf;

use docinspect_core::{AnalysisResult, Detection, MediaType, PageDetections, PageNote, Summary};

/// What one page contributed to the analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Completed {
        page: u32,
        detections: Vec<Detection>,
        /// Saved annotated image, if one was requested and written.
        artifact: Option<PathBuf>,
        /// Diagnostic for a failed artifact.
        note: Option<String>,
    },
    /// The page failed before detection and contributes nothing.
    Skipped { page: u32, reason: String },
}

impl PageOutcome {
    pub fn page(&self) -> u32 {
        match self {
            Self::Completed { page, .. } | Self::Skipped { page, .. } => *page,
        }
    }
}

/// Document-level facts carried into the result unchanged.
#[derive(Debug, Clone)]
pub struct ResultHeader {
    pub filename: String,
    pub media_type: MediaType,
    pub total_pages: usize,
    pub annotated: bool,
    pub output_directory: Option<PathBuf>,
    pub detector: &'static str,
}

/// Concatenate outcomes in page order, tally classes, and collect artifacts.
///
/// Outcomes may arrive in any order.
pub fn aggregate(header: ResultHeader, mut outcomes: Vec<PageOutcome>) -> AnalysisResult {
    outcomes.sort_by_key(PageOutcome::page);

    let mut pages = Vec::with_capacity(outcomes.len());
    let mut summary = Summary::default();
    let mut artifacts = Vec::new();
    let mut notes = Vec::new();

    for outcome in outcomes {
        match outcome {
            PageOutcome::Completed {
                page,
                detections,
                artifact,
                note,
            } => {
                for d in &detections {
                    summary.record(d.class);
                }
                artifacts.extend(artifact);
                if let Some(message) = note {
                    notes.push(PageNote { page, message });
                }
                pages.push(PageDetections { page, detections });
            }
            PageOutcome::Skipped { page, reason } => {
                notes.push(PageNote {
                    page,
                    message: format!("skipped: {reason}"),
                });
            }
        }
    }

    AnalysisResult {
        filename: header.filename,
        media_type: header.media_type,
        total_pages: header.total_pages,
        total: summary.total(),
        summary,
        pages,
        annotated: header.annotated.then_some(artifacts),
        output_directory: header.output_directory,
        notes,
        detector: header.detector,
    }
}
