// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON report produced from an analysis result.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use docinspect_core::{
    AnalysisResult, BoundingBox, Detection, DetectionClass, MediaType, PageNote, Result, Summary,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Serializable view of an [`AnalysisResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analysis_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub success: bool,
    pub filename: String,
    pub file_type: MediaType,
    pub detector: String,
    pub total_pages: usize,
    pub processed_pages: usize,
    pub total_detections: usize,
    pub summary: Summary,
    pub pages: Vec<PageReport>,
    /// Annotated image file names, in page order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<PageNote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    pub page: u32,
    pub detections: Vec<DetectionReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub class_id: u8,
    pub class_name: DetectionClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl From<&Detection> for DetectionReport {
    fn from(d: &Detection) -> Self {
        Self {
            class_id: d.class.id(),
            class_name: d.class,
            confidence: d.confidence,
            bbox: d.bbox,
        }
    }
}

impl AnalysisReport {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let annotated_images = result.annotated.as_ref().map(|paths| {
            paths
                .iter()
                .map(|p| {
                    p.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| p.display().to_string())
                })
                .collect()
        });

        Self {
            analysis_id: Uuid::new_v4(),
            analyzed_at: Utc::now(),
            success: true,
            filename: result.filename.clone(),
            file_type: result.media_type,
            detector: result.detector.to_string(),
            total_pages: result.total_pages,
            processed_pages: result.processed_pages(),
            total_detections: result.total,
            summary: result.summary,
            pages: result
                .pages
                .iter()
                .map(|p| PageReport {
                    page: p.page,
                    detections: p.detections.iter().map(DetectionReport::from).collect(),
                })
                .collect(),
            annotated_images,
            output_directory: result.output_directory.clone(),
            notes: result.notes.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as `<stem>_results.json` into `dir`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let stem = self
            .filename
            .rsplit_once('.')
            .map_or(self.filename.as_str(), |(stem, _)| stem);
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{stem}_results.json"));
        std::fs::write(&path, self.to_json_pretty()?)?;
        info!(path = %path.display(), "Report saved");
        Ok(path)
    }
}
