// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for docinspect.

use thiserror::Error;

/// Top-level error type for all docinspect operations.
#[derive(Debug, Error)]
pub enum DocInspectError {
    // -- Document-level (fatal) --
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("cannot decode {name}: {reason}")]
    CorruptFile { name: String, reason: String },

    #[error("PDF renderer unavailable: {0}")]
    Renderer(String),

    // -- Page-level (recoverable) --
    #[error("page {page} could not be processed: {reason}")]
    PageProcessing { page: u32, reason: String },

    // -- Detector construction --
    #[error("model could not be loaded: {0}")]
    ModelLoad(String),

    // -- Artifact-level (recoverable) --
    #[error("annotated image for page {page} was not written: {reason}")]
    Annotation { page: u32, reason: String },

    #[error("analysis cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocInspectError {
    /// Whether this error aborts the whole document analysis.
    ///
    /// Page and artifact failures degrade the result instead; a failed model
    /// load is handled by falling back to the synthetic detector.
    pub fn is_document_fatal(&self) -> bool {
        !matches!(
            self,
            Self::PageProcessing { .. } | Self::Annotation { .. } | Self::ModelLoad(_)
        )
    }

    /// Shorthand for a page-level failure.
    pub fn page(page: u32, reason: impl Into<String>) -> Self {
        Self::PageProcessing {
            page,
            reason: reason.into(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocInspectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_and_artifact_errors_are_recoverable() {
        assert!(!DocInspectError::page(2, "blank raster").is_document_fatal());
        assert!(
            !DocInspectError::Annotation {
                page: 1,
                reason: "disk full".into()
            }
            .is_document_fatal()
        );
        assert!(!DocInspectError::ModelLoad("missing".into()).is_document_fatal());
    }

    #[test]
    fn ingestion_errors_are_fatal() {
        assert!(DocInspectError::UnsupportedFormat("docx".into()).is_document_fatal());
        assert!(
            DocInspectError::CorruptFile {
                name: "scan.pdf".into(),
                reason: "no xref".into()
            }
            .is_document_fatal()
        );
        assert!(DocInspectError::Cancelled.is_document_fatal());
    }

    #[test]
    fn page_error_message_names_the_page() {
        let err = DocInspectError::page(3, "empty raster");
        assert_eq!(err.to_string(), "page 3 could not be processed: empty raster");
    }
}
